//! 可观测性：tracing 日志初始化
//!
//! 日志写 stderr，不与 stdout 上的用户对话混在一起。默认只输出 warn 及以上，verbose 时为 debug；
//! RUST_LOG 可覆盖。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true), "debug");
        assert_eq!(default_directive(false), "warn");
    }
}
