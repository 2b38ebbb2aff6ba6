//! tracing 初始化

use tracing_subscriber::EnvFilter;

/// 安装全局 subscriber
///
/// `RUST_LOG` 优先；否则默认 `info`，verbose 时为 `debug`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
