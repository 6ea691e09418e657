//! Edge-router rule builder.
//!
//! Produces the declarative routing configuration a workload needs to be
//! reachable at its subdomain. The rule is rendered into Traefik labels
//! that the runtime attaches to the workload at creation time; there is no
//! separate route registration call.

use std::collections::HashMap;

/// Insecure (HTTP) entrypoint name.
pub const HTTP_ENTRYPOINT: &str = "web";

/// Secure (HTTPS) entrypoint name.
pub const HTTPS_ENTRYPOINT: &str = "websecure";

/// Whether the deployment terminates TLS at the edge router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disabled,
    Enabled,
}

impl TlsMode {
    /// URL scheme for externally reachable instance URLs.
    pub fn scheme(self) -> &'static str {
        match self {
            TlsMode::Disabled => "http",
            TlsMode::Enabled => "https",
        }
    }
}

/// One router entry: a host match bound to an entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterEntry {
    pub name: String,
    pub entrypoint: &'static str,
    pub tls: bool,
    pub middlewares: Vec<String>,
}

/// Complete routing configuration for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    /// Service (and primary router) name; equal to the workload name.
    pub service: String,
    /// Host-match expression, e.g. ``Host(`alice-db.example.com`)``.
    pub host_rule: String,
    pub backend_port: u16,
    pub tls_required: bool,
    pub routers: Vec<RouterEntry>,
    /// HTTP -> HTTPS redirect middleware name, TLS mode only.
    pub redirect_middleware: Option<String>,
    /// Network the router uses to reach the workload.
    pub network: Option<String>,
}

/// Build the routing rule for a workload.
///
/// Without TLS a single router on [`HTTP_ENTRYPOINT`] is emitted. With TLS
/// the insecure router additionally redirects to HTTPS and a second
/// `-secure` router terminates TLS on [`HTTPS_ENTRYPOINT`].
pub fn build_rule(
    workload_name: &str,
    subdomain: &str,
    backend_port: u16,
    tls: TlsMode,
) -> RoutingRule {
    let host_rule = format!("Host(`{subdomain}`)");
    let mut routers = vec![RouterEntry {
        name: workload_name.to_string(),
        entrypoint: HTTP_ENTRYPOINT,
        tls: false,
        middlewares: Vec::new(),
    }];
    let mut redirect_middleware = None;

    if tls == TlsMode::Enabled {
        let redirect = format!("{workload_name}-redirect");
        routers[0].middlewares.push(redirect.clone());
        routers.push(RouterEntry {
            name: format!("{workload_name}-secure"),
            entrypoint: HTTPS_ENTRYPOINT,
            tls: true,
            middlewares: Vec::new(),
        });
        redirect_middleware = Some(redirect);
    }

    RoutingRule {
        service: workload_name.to_string(),
        host_rule,
        backend_port,
        tls_required: tls == TlsMode::Enabled,
        routers,
        redirect_middleware,
        network: None,
    }
}

impl RoutingRule {
    /// Attach the network the edge router should use to reach the workload.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Render the rule as Traefik container labels.
    pub fn to_labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("traefik.enable".to_string(), "true".to_string());
        labels.insert(
            format!(
                "traefik.http.services.{}.loadbalancer.server.port",
                self.service
            ),
            self.backend_port.to_string(),
        );
        if let Some(network) = &self.network {
            labels.insert("traefik.docker.network".to_string(), network.clone());
        }

        for router in &self.routers {
            let prefix = format!("traefik.http.routers.{}", router.name);
            labels.insert(format!("{prefix}.rule"), self.host_rule.clone());
            labels.insert(
                format!("{prefix}.entrypoints"),
                router.entrypoint.to_string(),
            );
            if router.tls {
                labels.insert(format!("{prefix}.tls"), "true".to_string());
            }
            if !router.middlewares.is_empty() {
                labels.insert(format!("{prefix}.middlewares"), router.middlewares.join(","));
            }
        }

        if let Some(redirect) = &self.redirect_middleware {
            labels.insert(
                format!("traefik.http.middlewares.{redirect}.redirectscheme.scheme"),
                "https".to_string(),
            );
        }

        labels
    }
}

/// Externally reachable URL of an instance.
pub fn external_url(subdomain: &str, tls: TlsMode) -> String {
    format!("{}://{subdomain}", tls.scheme())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_emits_single_router() {
        let rule = build_rule("pb-alice-db", "alice-db.example.com", 8090, TlsMode::Disabled);
        assert_eq!(rule.routers.len(), 1);
        assert!(!rule.tls_required);
        assert!(rule.redirect_middleware.is_none());

        let labels = rule.to_labels();
        assert_eq!(labels["traefik.enable"], "true");
        assert_eq!(
            labels["traefik.http.routers.pb-alice-db.rule"],
            "Host(`alice-db.example.com`)"
        );
        assert_eq!(labels["traefik.http.routers.pb-alice-db.entrypoints"], "web");
        assert_eq!(
            labels["traefik.http.services.pb-alice-db.loadbalancer.server.port"],
            "8090"
        );
        assert!(!labels.contains_key("traefik.http.routers.pb-alice-db.middlewares"));
        assert!(!labels.keys().any(|k| k.contains("-secure")));
    }

    #[test]
    fn tls_adds_redirect_and_secure_router() {
        let rule = build_rule("pb-alice-db", "alice-db.example.com", 8090, TlsMode::Enabled);
        assert!(rule.tls_required);
        assert_eq!(rule.routers.len(), 2);

        let labels = rule.to_labels();
        assert_eq!(
            labels["traefik.http.routers.pb-alice-db.middlewares"],
            "pb-alice-db-redirect"
        );
        assert_eq!(
            labels["traefik.http.middlewares.pb-alice-db-redirect.redirectscheme.scheme"],
            "https"
        );
        assert_eq!(
            labels["traefik.http.routers.pb-alice-db-secure.rule"],
            "Host(`alice-db.example.com`)"
        );
        assert_eq!(
            labels["traefik.http.routers.pb-alice-db-secure.entrypoints"],
            "websecure"
        );
        assert_eq!(labels["traefik.http.routers.pb-alice-db-secure.tls"], "true");
    }

    #[test]
    fn network_label_only_when_set() {
        let rule = build_rule("pb-a-b", "a-b.test", 80, TlsMode::Disabled);
        assert!(!rule.to_labels().contains_key("traefik.docker.network"));

        let labels = rule.with_network("fleet-network").to_labels();
        assert_eq!(labels["traefik.docker.network"], "fleet-network");
    }

    #[test]
    fn url_scheme_follows_tls_mode() {
        assert_eq!(external_url("a-b.test", TlsMode::Disabled), "http://a-b.test");
        assert_eq!(external_url("a-b.test", TlsMode::Enabled), "https://a-b.test");
    }
}
