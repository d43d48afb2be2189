use std::future::IntoFuture;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use log::LevelFilter;
use log::LevelFilter::Info;
use simple_logger::SimpleLogger;
use tokio::net::TcpListener;
use tokio::signal;

use axum_ip_guard::config;
use axum_ip_guard::{IpGuard, IpGuardBuilder};

/// Demo server guarded by the IP allowlist middleware.
///
/// Try it with e.g.
/// `IP_GUARD_ENABLED=true IP_GUARD_ALLOWLIST=192.168.0.0/16 cargo run --example allowlist_server`
/// and watch loopback requests pass while everything else gets the 403
/// rejection.
#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let test_env = get_test_env();
    SimpleLogger::new()
        .with_level(test_env.log_level)
        .init()
        .unwrap();

    let policy = match config::load_policy_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let guard = IpGuardBuilder::new().with_policy(policy).build();

    let app = Router::new()
        .route("/", get(|| async { "hello from behind the ip guard" }))
        .route("/health/ip-protection", get(IpGuard::status_handler))
        .layer(from_fn_with_state(guard.state(), IpGuard::enforce))
        .with_state(guard.state())
        .into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind(format!("{}:{}", test_env.addr, test_env.port))
        .await
        .unwrap();

    println!(
        "allowlist demo server listening at {}:{}",
        test_env.addr, test_env.port
    );

    async fn sig() {
        match signal::ctrl_c().await {
            Ok(()) => eprintln!("stopping allowlist demo server"),
            Err(err) => eprintln!("unable to listen for shutdown signal: {}", err),
        }
    }

    let _ = axum::serve(listener, app)
        .with_graceful_shutdown(sig().into_future())
        .await;
}

fn get_test_env() -> TestEnv {
    let addr = std::env::var("IP_GUARD_DEMO_ADDR")
        .ok()
        .and_then(|s| IpAddr::from_str(&s).ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::from([127, 0, 0, 1])));
    let port = std::env::var("IP_GUARD_DEMO_PORT")
        .ok()
        .and_then(|s| u16::from_str(&s).ok())
        .unwrap_or(3000);
    let log_level = std::env::var("IP_GUARD_DEMO_LOG_LEVEL")
        .ok()
        .and_then(|s| LevelFilter::from_str(&s).ok())
        .unwrap_or(Info);
    TestEnv {
        addr,
        port,
        log_level,
    }
}

struct TestEnv {
    addr: IpAddr,
    port: u16,
    log_level: LevelFilter,
}
