use crate::Result;

/// Initialize logging/tracing for the poller.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tgpoll=info,tgpoll_core=info,tgpoll_tls=info,{service_name}=info"
        ))
    });

    if let Err(e) = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
    {
        tracing::debug!(error = %e, "subscriber already installed; keeping it");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_first_subscriber() {
        assert!(init("first").is_ok());
        assert!(init("second").is_ok());
    }
}
