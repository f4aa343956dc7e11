//! Politeness gate for web crawling
//!
//! Handles robots.txt parsing and caching plus the per-domain minimum delay
//! check. Each domain's robots.txt is fetched at most once per process: the
//! cached verdict is never refreshed, so a very long crawl keeps honouring
//! whatever the file said when the domain was first seen.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::domain_of;
use super::fetcher::FetchService;

/// One `User-agent` group of a robots.txt file
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    /// Lowercased agent tokens this group applies to
    agents: Vec<String>,
    disallow_patterns: Vec<String>,
    allow_patterns: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl RuleGroup {
    fn applies_to_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    fn applies_to(&self, ua_token: &str) -> bool {
        self.agents
            .iter()
            .any(|a| a != "*" && ua_token.contains(a.as_str()))
    }
}

/// Parsed robots.txt rules
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
}

impl RobotsRules {
    /// Parse robots.txt content. Unknown directives and malformed lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut current = RuleGroup::default();
        let mut in_agent_lines = false;

        for line in content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if !in_agent_lines && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_lowercase());
                    in_agent_lines = true;
                }
                "disallow" if !current.agents.is_empty() => {
                    in_agent_lines = false;
                    if !value.is_empty() {
                        current.disallow_patterns.push(value.to_string());
                    }
                }
                "allow" if !current.agents.is_empty() => {
                    in_agent_lines = false;
                    if !value.is_empty() {
                        current.allow_patterns.push(value.to_string());
                    }
                }
                "crawl-delay" if !current.agents.is_empty() => {
                    in_agent_lines = false;
                    if let Ok(delay) = value.parse::<f64>() {
                        if delay.is_finite() && delay >= 0.0 {
                            current.crawl_delay = Some(Duration::from_secs_f64(delay));
                        }
                    }
                }
                _ => {}
            }
        }

        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// The group governing `user_agent`: a specific match wins over `*`
    fn group_for(&self, user_agent: &str) -> Option<&RuleGroup> {
        let ua_token = user_agent
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        self.groups
            .iter()
            .find(|g| !ua_token.is_empty() && g.applies_to(&ua_token))
            .or_else(|| self.groups.iter().find(|g| g.applies_to_wildcard()))
    }

    /// Check if a path (with query) is allowed for `user_agent`
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let longest_allow_match = group
            .allow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        let longest_disallow_match = group
            .disallow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        // Longer match wins; if equal, allow wins
        longest_allow_match >= longest_disallow_match
    }

    /// `Crawl-delay` for `user_agent`, if the file declares one
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay)
    }

    /// Check if a path matches a robots.txt pattern (`*` wildcards, `$` anchor)
    fn path_matches(path: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }

        let (pattern, anchored) = match pattern.strip_suffix('$') {
            Some(stripped) => (stripped, true),
            None => (pattern, false),
        };

        if !pattern.contains('*') {
            return if anchored {
                path == pattern
            } else {
                path.starts_with(pattern)
            };
        }

        Self::wildcard_match(path.as_bytes(), pattern.as_bytes(), anchored)
    }

    /// Glob match where `*` spans any run of bytes. Unanchored patterns only
    /// need to match a prefix of `path`.
    ///
    /// On a mismatch the most recent `*` is retried one byte further along,
    /// so a suffix such as `.pdf$` is found at its last occurrence too.
    fn wildcard_match(path: &[u8], pattern: &[u8], anchored: bool) -> bool {
        let (mut p, mut t) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while t < path.len() {
            if p < pattern.len() && pattern[p] == b'*' {
                backtrack = Some((p, t));
                p += 1;
            } else if p < pattern.len() && pattern[p] == path[t] {
                p += 1;
                t += 1;
            } else if p == pattern.len() && !anchored {
                return true;
            } else if let Some((star, from)) = backtrack {
                p = star + 1;
                t = from + 1;
                backtrack = Some((star, from + 1));
            } else {
                return false;
            }
        }

        pattern[p..].iter().all(|&b| b == b'*')
    }
}

/// Cached robots.txt decision for one domain
#[derive(Debug, Clone)]
pub enum RobotsPolicy {
    /// robots.txt was fetched and parsed
    Rules(RobotsRules),
    /// robots.txt unknown or unreachable: everything is allowed
    Permissive,
}

impl RobotsPolicy {
    /// Evaluate the policy for `url` as seen by `user_agent`
    pub fn allows(&self, user_agent: &str, url: &Url) -> bool {
        match self {
            RobotsPolicy::Permissive => true,
            RobotsPolicy::Rules(rules) => {
                let target = match url.query() {
                    Some(query) => format!("{}?{}", url.path(), query),
                    None => url.path().to_string(),
                };
                rules.is_allowed(user_agent, &target)
            }
        }
    }
}

/// True once more than `min_delay` seconds have passed since `last_fetch`.
///
/// A domain never fetched counts as last fetched at the epoch, so it is
/// immediately eligible.
pub fn is_domain_ready(last_fetch: Option<f64>, now: f64, min_delay_secs: f64) -> bool {
    now - last_fetch.unwrap_or(0.0) > min_delay_secs
}

/// robots.txt gate with a per-domain policy cache
pub struct PolitenessGate {
    /// Collaborator used for robots.txt requests
    fetcher: Arc<dyn FetchService>,
    /// Domain -> policy, populated on first sight of a domain
    robots_cache: RwLock<HashMap<String, Arc<RobotsPolicy>>>,
    /// Bound on each robots.txt fetch
    robots_timeout: Duration,
}

impl PolitenessGate {
    pub fn new(fetcher: Arc<dyn FetchService>, robots_timeout: Duration) -> Self {
        Self {
            fetcher,
            robots_cache: RwLock::new(HashMap::new()),
            robots_timeout,
        }
    }

    /// Check whether robots.txt allows `user_agent` to fetch `url`.
    ///
    /// The first call for a domain fetches its robots.txt; any failure caches
    /// a permissive policy. Concurrent first calls may each fetch, but the
    /// first policy stored is the one every caller sees afterwards.
    pub async fn can_fetch(&self, url: &Url, user_agent: &str) -> bool {
        let domain = domain_of(url);
        let policy = self.policy_for(&domain, user_agent).await;

        let allowed = policy.allows(user_agent, url);
        if !allowed {
            info!("Robots.txt disallows crawling: {}", url);
        }
        allowed
    }

    /// Cached policy for `domain`, fetching robots.txt if not yet known
    pub async fn policy_for(&self, domain: &str, user_agent: &str) -> Arc<RobotsPolicy> {
        let cached = self.robots_cache.read().get(domain).cloned();
        if let Some(policy) = cached {
            return policy;
        }

        let fetched = Arc::new(self.fetch_policy(domain, user_agent).await);

        let mut cache = self.robots_cache.write();
        Arc::clone(cache.entry(domain.to_string()).or_insert(fetched))
    }

    async fn fetch_policy(&self, domain: &str, user_agent: &str) -> RobotsPolicy {
        let robots_url = match Url::parse(domain).and_then(|d| d.join("/robots.txt")) {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not build robots.txt URL for {}: {}", domain, e);
                return RobotsPolicy::Permissive;
            }
        };

        debug!("Reading robots.txt for domain: {}", domain);
        let request = self.fetcher.fetch(&robots_url, self.robots_timeout);

        match tokio::time::timeout(self.robots_timeout, request).await {
            Ok(Ok(response)) if response.status_code == 200 => {
                debug!("Successfully loaded robots.txt for {}", domain);
                let rules = RobotsRules::parse(&response.body);
                if let Some(delay) = rules.crawl_delay(user_agent) {
                    info!(
                        "robots.txt for {} asks for a {:?} crawl delay, keeping the configured minimum",
                        domain, delay
                    );
                }
                RobotsPolicy::Rules(rules)
            }
            Ok(Ok(response)) => {
                debug!(
                    "robots.txt returned {} for {}, assuming crawl allowed",
                    response.status_code, domain
                );
                RobotsPolicy::Permissive
            }
            Ok(Err(e)) => {
                warn!("Could not read robots.txt for {}: {}", domain, e);
                RobotsPolicy::Permissive
            }
            Err(_) => {
                warn!(
                    "Timeout reading robots.txt for {} ({:?}), assuming crawl allowed",
                    domain, self.robots_timeout
                );
                RobotsPolicy::Permissive
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::fetcher::{FetchError, FetchResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed robots.txt response and counts requests
    struct RobotsServer {
        status: u16,
        body: String,
        fail: bool,
        delay: Option<Duration>,
        requests: AtomicUsize,
    }

    impl RobotsServer {
        fn ok(body: &str) -> Self {
            Self {
                status: 200,
                body: body.to_string(),
                fail: false,
                delay: None,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FetchService for RobotsServer {
        async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(FetchError::Timeout(timeout));
            }
            Ok(FetchResponse {
                final_url: url.clone(),
                status_code: self.status,
                headers: vec![],
                body: self.body.clone(),
            })
        }

        async fn head(&self, _url: &Url, _timeout: Duration) -> Result<Vec<(String, String)>, FetchError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_robots_parsing() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/
Crawl-delay: 2

User-agent: crawlfront
Disallow: /admin/
Crawl-delay: 1
"#;

        let robots = RobotsRules::parse(content);

        // Specific rules for our agent
        assert!(robots.is_allowed("crawlfront/0.1", "/public/page.html"));
        assert!(!robots.is_allowed("crawlfront/0.1", "/admin/settings"));
        assert!(robots.is_allowed("crawlfront/0.1", "/private/test"));
        assert_eq!(robots.crawl_delay("crawlfront/0.1"), Some(Duration::from_secs(1)));

        // Everyone else gets the wildcard group
        assert!(!robots.is_allowed("OtherBot", "/private/test"));
        assert!(robots.is_allowed("OtherBot", "/private/public/x"));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_robots_wildcard() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /*.pdf$
Allow: /private/readme.txt
"#;

        let robots = RobotsRules::parse(content);

        assert!(robots.is_allowed("TestBot", "/public/page.html"));
        assert!(!robots.is_allowed("TestBot", "/private/secret"));
        assert!(robots.is_allowed("TestBot", "/private/readme.txt"));
        assert!(!robots.is_allowed("TestBot", "/docs/manual.pdf"));
        assert!(robots.is_allowed("TestBot", "/docs/manual.html"));
    }

    #[test]
    fn test_grouped_agents_share_rules() {
        let content = "User-agent: a-bot\nUser-agent: b-bot\nDisallow: /shared/\n\nUser-agent: *\nDisallow:\n";
        let robots = RobotsRules::parse(content);

        assert!(!robots.is_allowed("a-bot", "/shared/x"));
        assert!(!robots.is_allowed("b-bot/2.0", "/shared/x"));
        assert!(robots.is_allowed("c-bot", "/shared/x"));
    }

    #[test]
    fn test_no_matching_group_allows_everything() {
        let robots = RobotsRules::parse("User-agent: SpecificBot\nDisallow: /\n");
        assert!(robots.is_allowed("crawlfront", "/anything"));
        assert!(!robots.is_allowed("SpecificBot", "/anything"));
    }

    #[test]
    fn test_path_matching() {
        assert!(RobotsRules::path_matches("/admin/test", "/admin/"));
        assert!(!RobotsRules::path_matches("/public/test", "/admin/"));
        assert!(RobotsRules::path_matches("/images/cat.jpg", "/images/*.jpg"));
        assert!(RobotsRules::path_matches("/page.html", "/page.html$"));
        assert!(!RobotsRules::path_matches("/page.html?query", "/page.html$"));
    }

    #[test]
    fn test_anchored_suffix_matches_last_occurrence() {
        assert!(RobotsRules::path_matches("/a.pdf/b.pdf", "/*.pdf$"));
        assert!(RobotsRules::path_matches("/x.php.php", "/*.php$"));
        assert!(!RobotsRules::path_matches("/a.pdf/b.html", "/*.pdf$"));
        assert!(RobotsRules::path_matches("/a/b/c", "/a*$"));
        assert!(RobotsRules::path_matches("/shop/x/cart/y/cart", "/shop/*/cart$"));
        assert!(!RobotsRules::path_matches("/shop/cart/extra", "/shop/*/cart$"));

        let robots = RobotsRules::parse("User-agent: *\nDisallow: /*.pdf$\n");
        assert!(!robots.is_allowed("crawlfront", "/a.pdf/b.pdf"));
        assert!(robots.is_allowed("crawlfront", "/a.pdf/b.html"));
    }

    #[test]
    fn test_unanchored_wildcard_is_a_prefix_match() {
        assert!(RobotsRules::path_matches("/tmp/a/b/file.txt", "/tmp/*/b"));
        assert!(RobotsRules::path_matches("/search?q=1&page=2", "/*?q="));
        assert!(!RobotsRules::path_matches("/docs/tmp/a", "/tmp/*"));
    }

    #[test]
    fn test_policy_checks_query_string() {
        let policy = RobotsPolicy::Rules(RobotsRules::parse("User-agent: *\nDisallow: /search?\n"));
        let blocked = Url::parse("https://example.com/search?q=rust").unwrap();
        let open = Url::parse("https://example.com/search").unwrap();

        assert!(!policy.allows("crawlfront", &blocked));
        assert!(policy.allows("crawlfront", &open));
        assert!(RobotsPolicy::Permissive.allows("crawlfront", &blocked));
    }

    #[test]
    fn test_is_domain_ready() {
        // Never fetched: epoch default makes the domain eligible
        assert!(is_domain_ready(None, 1_000.0, 1.0));
        assert!(!is_domain_ready(Some(999.5), 1_000.0, 1.0));
        assert!(is_domain_ready(Some(998.0), 1_000.0, 1.0));
        // Exactly the delay is not enough
        assert!(!is_domain_ready(Some(999.0), 1_000.0, 1.0));
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_domain() {
        let server = Arc::new(RobotsServer::ok("User-agent: *\nDisallow: /private/\n"));
        let gate = PolitenessGate::new(server.clone(), Duration::from_secs(2));

        let a = Url::parse("https://example.com/public").unwrap();
        let b = Url::parse("https://example.com/private/x").unwrap();

        assert!(gate.can_fetch(&a, "crawlfront").await);
        assert!(!gate.can_fetch(&b, "crawlfront").await);
        assert_eq!(server.requests.load(Ordering::SeqCst), 1);
        assert_eq!(gate.robots_cache.read().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_robots_fetch_is_permissive_and_cached() {
        let server = Arc::new(RobotsServer {
            fail: true,
            ..RobotsServer::ok("")
        });
        let gate = PolitenessGate::new(server.clone(), Duration::from_secs(2));
        let url = Url::parse("https://down.example/page").unwrap();

        assert!(gate.can_fetch(&url, "crawlfront").await);
        assert!(gate.can_fetch(&url, "crawlfront").await);
        assert_eq!(server.requests.load(Ordering::SeqCst), 1);
        let policy = gate.policy_for("https://down.example", "crawlfront").await;
        assert!(matches!(*policy, RobotsPolicy::Permissive));
    }

    #[tokio::test]
    async fn test_non_200_robots_is_permissive() {
        let server = Arc::new(RobotsServer {
            status: 404,
            ..RobotsServer::ok("User-agent: *\nDisallow: /\n")
        });
        let gate = PolitenessGate::new(server, Duration::from_secs(2));
        let url = Url::parse("https://example.com/anything").unwrap();

        assert!(gate.can_fetch(&url, "crawlfront").await);
    }

    #[tokio::test]
    async fn test_slow_robots_times_out() {
        let server = Arc::new(RobotsServer {
            delay: Some(Duration::from_secs(5)),
            ..RobotsServer::ok("User-agent: *\nDisallow: /\n")
        });
        let gate = PolitenessGate::new(server, Duration::from_millis(50));
        let url = Url::parse("https://slow.example/page").unwrap();

        assert!(gate.can_fetch(&url, "crawlfront").await);
    }

    #[tokio::test]
    async fn test_domains_are_cached_separately() {
        let server = Arc::new(RobotsServer::ok("User-agent: *\nDisallow:\n"));
        let gate = PolitenessGate::new(server.clone(), Duration::from_secs(2));

        for raw in [
            "https://a.example/1",
            "https://a.example/2",
            "http://a.example/3",
            "https://b.example/1",
        ] {
            gate.can_fetch(&Url::parse(raw).unwrap(), "crawlfront").await;
        }

        assert_eq!(server.requests.load(Ordering::SeqCst), 3);
    }
}
