use std::process::exit;

fn main() {
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

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            exit(1);
        }
    };
    if let Err(e) = runtime.block_on(bennes_lib::start_marketing_notifications(config)) {
        bennes_lib::sentry_integration::log_and_capture_error(&e);
        exit(1);
    }
}
