use clap::Parser;
use step_journey::cli::{
    Args, build_config, build_providers, init_logging, load_jwt_secret, load_oauth_secrets,
    open_database, parse_url,
};
use step_journey::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref(), args.environment)
    else {
        std::process::exit(1);
    };

    let Some(frontend_url) = parse_url("frontend-url", &args.frontend_url) else {
        std::process::exit(1);
    };
    let Some(backend_url) = parse_url("backend-url", &args.backend_url) else {
        std::process::exit(1);
    };

    let Some(oauth_secrets) = load_oauth_secrets(&args) else {
        std::process::exit(1);
    };
    let Some(providers) = build_providers(&oauth_secrets, &backend_url) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(
        db,
        jwt_secret,
        args.environment,
        args.cookie_domain,
        frontend_url,
        backend_url,
        providers,
    );

    info!(
        address = %local_addr,
        environment = ?args.environment,
        secure_cookies = config.secure_cookies,
        "Listening"
    );

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
