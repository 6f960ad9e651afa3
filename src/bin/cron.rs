use ridelink::{Config, prune_locations, prune_sessions};
use tracing_subscriber::EnvFilter;

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} <prune-locations|prune-sessions>");
}

fn init_tracing(log_level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args();
    let bin_name = args.next().unwrap_or_else(|| "cron".to_string());
    let command = args.next();

    if args.next().is_some() {
        print_usage(&bin_name);
        std::process::exit(2);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level, config.logging.json_format);

    let result = match command.as_deref() {
        Some("prune-locations") => prune_locations(&config).await.map(|removed| format!("Location pruning completed: removed={removed}")),
        Some("prune-sessions") => prune_sessions(&config).await.map(|removed| format!("Session pruning completed: removed={removed}")),
        _ => {
            print_usage(&bin_name);
            std::process::exit(2);
        }
    };

    match result {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            eprintln!("Cron job failed: {err}");
            std::process::exit(1);
        }
    }
}
