use tracing_subscriber::EnvFilter;

/// Directive that surfaces SQL statement tracing from the storage backend.
const ECHO_DIRECTIVE: &str = "liquor_etl::sql=debug";

static INIT_ONCE: std::sync::Once = std::sync::Once::new();

/// Install the global subscriber once. `RUST_LOG` wins; default is `info`.
/// With `echo`, SQL statements are logged as well.
pub fn init_tracing_once(echo: bool) {
    INIT_ONCE.call_once(|| {
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if echo {
            if let Ok(d) = ECHO_DIRECTIVE.parse() {
                filter = filter.add_directive(d);
            }
        }
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
