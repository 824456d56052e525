use aws_config::BehaviorVersion;
use aws_sdk_lambda::Client;
use clap::Parser;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

const DEFAULT_PROMPTS: &[&str] = &[
    "Hello",
    "Summarize the plot of Hamlet in one sentence.",
    "Write a haiku about serverless functions.",
    "What is the capital of Australia?",
    "Explain ownership in Rust to a beginner.",
];

#[derive(Default)]
struct Stats {
    success_count: usize,
    client_error_count: usize,
    server_error_count: usize,
    invoke_error_count: usize,
    total_latency_ms: f64,
}

/// The part of an HTTP proxy response the driver cares about.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    status_code: u16,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "invoke-test")]
#[command(about = "Invoke the prompt relay Lambda function with random prompts")]
struct Args {
    /// Lambda function name
    function: String,

    /// Number of iterations to run
    #[arg(long, default_value = "10")]
    iters: usize,

    /// Number of parallel threads
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Prompt to send; repeat to pick randomly among several
    #[arg(long = "prompt")]
    prompts: Vec<String>,
}

/// Wraps a prompt in a function URL (HTTP API v2) event.
fn http_event(prompt: &str) -> serde_json::Value {
    let body = serde_json::json!({ "prompt": prompt }).to_string();

    serde_json::json!({
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": "/",
        "rawQueryString": "",
        "headers": { "content-type": "application/json" },
        "requestContext": {
            "accountId": "anonymous",
            "apiId": "invoke-test",
            "domainName": "invoke-test.lambda-url.localhost",
            "domainPrefix": "invoke-test",
            "http": {
                "method": "POST",
                "path": "/",
                "protocol": "HTTP/1.1",
                "sourceIp": "127.0.0.1",
                "userAgent": "invoke-test"
            },
            "requestId": "invoke-test",
            "routeKey": "$default",
            "stage": "$default",
            "time": "01/Jan/2025:00:00:00 +0000",
            "timeEpoch": 0
        },
        "body": body,
        "isBase64Encoded": false
    })
}

async fn run_invocations(
    client: Arc<Client>,
    function_name: String,
    prompts: Arc<Vec<String>>,
    thread_id: usize,
    start: usize,
    end: usize,
    total: usize,
    stats: Arc<Mutex<Stats>>,
) {
    let mut rng = StdRng::from_entropy();

    for i in start..=end {
        let prompt = prompts
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROMPTS[0]);

        let payload = match serde_json::to_vec(&http_event(prompt)) {
            Ok(payload) => payload,
            Err(e) => {
                {
                    let mut stats = stats.lock().await;
                    stats.invoke_error_count += 1;
                }

                eprintln!(
                    "[Thread {}: {}/{}] Error encoding event for {:?}: {}",
                    thread_id, i, total, prompt, e
                );
                continue;
            }
        };

        let started = Instant::now();
        let result = client
            .invoke()
            .function_name(&function_name)
            .payload(aws_sdk_lambda::primitives::Blob::new(payload))
            .send()
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                let response_payload = response
                    .payload()
                    .map(|b| String::from_utf8_lossy(b.as_ref()).to_string())
                    .unwrap_or_else(|| "No response".to_string());

                let parsed = serde_json::from_str::<ProxyResponse>(&response_payload).ok();
                let status = parsed.as_ref().map(|r| r.status_code);

                {
                    let mut stats = stats.lock().await;
                    match status {
                        Some(200) => {
                            stats.success_count += 1;
                            stats.total_latency_ms += latency_ms;
                        }
                        Some(400..=499) => stats.client_error_count += 1,
                        // Function errors come back without a status code.
                        _ => stats.server_error_count += 1,
                    }
                }

                let body = parsed.and_then(|r| r.body).unwrap_or(response_payload);

                println!(
                    "[Thread {}: {}/{}] {:?} => {} in {:.3}ms: {}",
                    thread_id,
                    i,
                    total,
                    prompt,
                    status.map_or_else(|| "error".to_string(), |s| s.to_string()),
                    latency_ms,
                    body
                );
            }
            Err(e) => {
                {
                    let mut stats = stats.lock().await;
                    stats.invoke_error_count += 1;
                }

                eprintln!(
                    "[Thread {}: {}/{}] Error invoking with {:?}: {}",
                    thread_id, i, total, prompt, e
                );
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let threads = args.threads.max(1);

    let prompts: Vec<String> = if args.prompts.is_empty() {
        DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect()
    } else {
        args.prompts
    };
    let prompts = Arc::new(prompts);

    println!(
        "Running {} invocations across {} thread(s)",
        args.iters, threads
    );

    // Create AWS Lambda client
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Arc::new(Client::new(&config));

    let stats = Arc::new(Mutex::new(Stats::default()));

    let iters_per_thread = args.iters / threads;
    let remainder = args.iters % threads;

    let mut tasks = JoinSet::new();

    let total_iters = args.iters;

    let mut start = 1;
    for t in 1..=threads {
        let count = if t == threads {
            iters_per_thread + remainder
        } else {
            iters_per_thread
        };
        if count == 0 {
            continue;
        }
        let end = start + count - 1;

        let client = Arc::clone(&client);
        let function_name = args.function.clone();
        let prompts = Arc::clone(&prompts);
        let stats = Arc::clone(&stats);

        tasks.spawn(async move {
            run_invocations(
                client,
                function_name,
                prompts,
                t,
                start,
                end,
                total_iters,
                stats,
            )
            .await;
        });

        start = end + 1;
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            eprintln!("Task failed: {}", e);
        }
    }

    let stats = stats.lock().await;
    println!("Completed {} invocations", args.iters);
    println!();
    println!("Results:");
    println!("  Success:        {}", stats.success_count);
    println!("  Client errors:  {}", stats.client_error_count);
    println!("  Server errors:  {}", stats.server_error_count);
    println!("  Invoke errors:  {}", stats.invoke_error_count);
    if stats.success_count > 0 {
        let avg_latency = stats.total_latency_ms / stats.success_count as f64;
        println!("  Avg latency: {:.3}ms", avg_latency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_prompt_as_json_body() {
        let event = http_event("say \"hi\"");

        assert_eq!(event["requestContext"]["http"]["method"], "POST");
        let body: serde_json::Value =
            serde_json::from_str(event["body"].as_str().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "prompt": "say \"hi\"" }));
    }

    #[test]
    fn encoded_event_round_trips_through_json() {
        let bytes = serde_json::to_vec(&http_event("Hello")).unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded["body"], r#"{"prompt":"Hello"}"#);
        assert_eq!(decoded["isBase64Encoded"], false);
    }

    #[test]
    fn proxy_response_parses_status_and_body() {
        let raw = r#"{"statusCode":500,"headers":{},"body":"{\"text\":\"nope\"}","isBase64Encoded":false}"#;
        let parsed: ProxyResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.status_code, 500);
        assert_eq!(parsed.body.as_deref(), Some(r#"{"text":"nope"}"#));
    }
}
