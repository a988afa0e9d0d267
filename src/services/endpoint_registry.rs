use crate::config::Config;
use crate::models::webhook::EventKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// 根据事件类型解析 webhook 目标地址
///
/// 每次调用都重新读取配置，配置变更无需重启即可生效。
/// 未配置时返回空列表，这不是错误。
#[cfg_attr(test, mockall::automock)]
pub trait EndpointRegistry: Send + Sync {
    fn resolve(&self, kind: EventKind) -> Vec<Url>;
}

/// Parses a comma and/or whitespace separated URL list. Entries that are not
/// absolute http(s) URLs are skipped with a warning.
pub fn parse_endpoint_list(raw: &str) -> Vec<Url> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match Url::parse(entry) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                warn!("Skipping webhook endpoint with unsupported scheme: {}", url);
                None
            }
            Err(e) => {
                warn!("Skipping malformed webhook endpoint {:?}: {}", entry, e);
                None
            }
        })
        .collect()
}

/// 变量名 -> 值
type VarLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads one environment variable per event kind on every call.
#[derive(Clone)]
pub struct EnvEndpointRegistry {
    new_ticket_var: String,
    followup_var: String,
    lookup: VarLookup,
}

impl EnvEndpointRegistry {
    pub fn new(new_ticket_var: impl Into<String>, followup_var: impl Into<String>) -> Self {
        Self {
            new_ticket_var: new_ticket_var.into(),
            followup_var: followup_var.into(),
            lookup: Arc::new(|name: &str| env::var(name).ok()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.new_ticket_webhook_var.clone(),
            config.followup_webhook_var.clone(),
        )
    }

    /// Replaces the process environment as the variable source, e.g. with a
    /// secrets store that is refreshed at runtime.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    fn var_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::NewTicket => &self.new_ticket_var,
            EventKind::FollowUp => &self.followup_var,
        }
    }
}

impl fmt::Debug for EnvEndpointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvEndpointRegistry")
            .field("new_ticket_var", &self.new_ticket_var)
            .field("followup_var", &self.followup_var)
            .finish_non_exhaustive()
    }
}

impl EndpointRegistry for EnvEndpointRegistry {
    fn resolve(&self, kind: EventKind) -> Vec<Url> {
        (self.lookup)(self.var_for(kind))
            .map(|raw| parse_endpoint_list(&raw))
            .unwrap_or_default()
    }
}

/// An endpoint table the host replaces explicitly, e.g. on each request
/// boundary or after an admin change.
#[derive(Debug, Default)]
pub struct StaticEndpointRegistry {
    endpoints: RwLock<HashMap<EventKind, Vec<Url>>>,
}

impl StaticEndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: EventKind, endpoints: Vec<Url>) {
        self.endpoints.write().insert(kind, endpoints);
    }

    pub fn set_from_str(&self, kind: EventKind, raw: &str) {
        self.set(kind, parse_endpoint_list(raw));
    }

    pub fn clear(&self) {
        self.endpoints.write().clear();
    }
}

impl EndpointRegistry for StaticEndpointRegistry {
    fn resolve(&self, kind: EventKind) -> Vec<Url> {
        self.endpoints.read().get(&kind).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_mixed_delimiters() {
        let urls = parse_endpoint_list(
            "http://localhost:8123/new-ticket, https://hooks.example.com/a\n\thttp://10.0.0.1/b",
        );
        let urls: Vec<String> = urls.into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:8123/new-ticket",
                "https://hooks.example.com/a",
                "http://10.0.0.1/b",
            ]
        );
    }

    #[test]
    fn test_parse_skips_invalid_entries() {
        let urls = parse_endpoint_list("not a url,ftp://files.example.com/x,,http://ok.example.com/");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "http://ok.example.com/");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_endpoint_list("").is_empty());
        assert!(parse_endpoint_list(" , \n").is_empty());
    }

    #[test]
    fn test_env_registry_unset_variable() {
        let registry = EnvEndpointRegistry::new(
            "HELPDESK_TEST_REGISTRY_UNSET_NEW_TICKET",
            "HELPDESK_TEST_REGISTRY_UNSET_FOLLOWUP",
        );
        assert!(registry.resolve(EventKind::NewTicket).is_empty());
        assert!(registry.resolve(EventKind::FollowUp).is_empty());
    }

    #[test]
    fn test_env_registry_reads_fresh_values() {
        let vars: Arc<RwLock<HashMap<String, String>>> = Arc::default();
        let source = vars.clone();
        let registry = EnvEndpointRegistry::new("NEW_TICKET_URLS", "FOLLOWUP_URLS")
            .with_lookup(move |name| source.read().get(name).cloned());
        assert!(registry.resolve(EventKind::NewTicket).is_empty());

        vars.write().insert("NEW_TICKET_URLS".to_string(), "http://localhost:1/one".to_string());
        assert_eq!(registry.resolve(EventKind::NewTicket).len(), 1);
        assert!(registry.resolve(EventKind::FollowUp).is_empty());

        vars.write().insert(
            "NEW_TICKET_URLS".to_string(),
            "http://localhost:1/one http://localhost:1/two".to_string(),
        );
        assert_eq!(registry.resolve(EventKind::NewTicket).len(), 2);

        vars.write().remove("NEW_TICKET_URLS");
        assert!(registry.resolve(EventKind::NewTicket).is_empty());
    }

    #[test]
    fn test_static_registry() {
        let registry = StaticEndpointRegistry::new();
        registry.set_from_str(EventKind::FollowUp, "http://localhost:1/followup");

        assert!(registry.resolve(EventKind::NewTicket).is_empty());
        assert_eq!(registry.resolve(EventKind::FollowUp).len(), 1);

        registry.clear();
        assert!(registry.resolve(EventKind::FollowUp).is_empty());
    }

    proptest! {
        #[test]
        fn test_parse_keeps_every_valid_entry(ports in proptest::collection::vec(1u16..65535, 0..8)) {
            let raw = ports
                .iter()
                .map(|p| format!("http://127.0.0.1:{}/hook", p))
                .collect::<Vec<_>>()
                .join(", ");
            prop_assert_eq!(parse_endpoint_list(&raw).len(), ports.len());
        }
    }
}
