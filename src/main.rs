use std::process::exit;

#[tokio::main]
async fn main() {
    let config = match bennes_lib::config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Can't load app config: {}", e);
            exit(1);
        }
    };

    // Prepare sentry integration
    let _sentry = bennes_lib::sentry_integration::init(config.sentry.as_ref());

    // Prepare logger
    env_logger::init();

    if let Err(e) = bennes_lib::start_server(config).await {
        bennes_lib::sentry_integration::log_and_capture_error(&e);
        exit(1);
    }
}
