use once_cell::sync::Lazy;
use regex::Regex;

/// Fields extracted from a `User-Agent` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub mobile: bool,
    pub bot: bool,
    /// First item of the comment, e.g. `Windows NT 10.0` or `iPhone`
    pub platform: String,
    pub os: String,
    pub browser: String,
    pub browser_version: String,
    pub engine: String,
    pub engine_version: String,
}

pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> UserAgentInfo;
}

struct BrowserRule {
    pattern: Regex,
    name: &'static str,
}

fn rule(pattern: &str, name: &'static str) -> BrowserRule {
    BrowserRule {
        pattern: Regex::new(pattern).expect("user agent rule"),
        name,
    }
}

// Order matters: Edge and Opera also send Chrome and Safari tokens, and
// Chrome also sends Safari.
static BROWSERS: Lazy<Vec<BrowserRule>> = Lazy::new(|| {
    vec![
        rule(r"\bEdge?/([\w.]+)", "Edge"),
        rule(r"\bEdgA/([\w.]+)", "Edge"),
        rule(r"\bOPR/([\w.]+)", "Opera"),
        rule(r"\bOpera[/ ]([\w.]+)", "Opera"),
        rule(r"\bSamsungBrowser/([\w.]+)", "Samsung Internet"),
        rule(r"\bUCBrowser/([\w.]+)", "UC Browser"),
        rule(r"\bMicroMessenger/([\w.]+)", "WeChat"),
        rule(r"\bChromium/([\w.]+)", "Chromium"),
        rule(r"\bCriOS/([\w.]+)", "Chrome"),
        rule(r"\bChrome/([\w.]+)", "Chrome"),
        rule(r"\bFxiOS/([\w.]+)", "Firefox"),
        rule(r"\bFirefox/([\w.]+)", "Firefox"),
        rule(r"\bMSIE ([\w.]+)", "Internet Explorer"),
        rule(r"\bTrident/.*\brv:([\w.]+)", "Internet Explorer"),
        rule(r"\bVersion/([\w.]+).*\bSafari/", "Safari"),
    ]
});

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("comment regex"));

static PRODUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^/\s(]+)(?:/([^\s(]+))?").expect("product regex"));

static BOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([\w.-]*(?:bot|crawler|spider|slurp|crawling)[\w.-]*)(?:/([\w.]+))?")
        .expect("bot regex")
});

static HTTP_CLIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(curl|wget|python-requests|python-urllib|go-http-client|java|okhttp|apache-httpclient)(?:/([\w.]+))?")
        .expect("http client regex")
});

static MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmobile\b|iphone|ipod|windows phone|blackberry|opera mini|\bmobi\b")
        .expect("mobile regex")
});

static ENGINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(AppleWebKit|Trident|Presto|EdgeHTML|Blink)/([\w.]+)").expect("engine regex")
});

static GECKO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bGecko/([\w.]+)").expect("gecko regex"));

static GECKO_RV: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brv:([\w.]+)").expect("rv regex"));

static WINDOWS_NT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Windows NT ([\d.]+)").expect("windows regex"));

/// User-agent parser driven by ordered regex rules. It recognises the
/// common desktop and mobile browsers, crawlers and HTTP client libraries;
/// anything else reports its first product token as the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexUserAgentParser;

impl RegexUserAgentParser {
    pub fn new() -> Self {
        RegexUserAgentParser
    }
}

impl UserAgentParser for RegexUserAgentParser {
    fn parse(&self, user_agent: &str) -> UserAgentInfo {
        let comment: Vec<&str> = COMMENT
            .captures(user_agent)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().split(';').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let mut info = UserAgentInfo {
            platform: comment
                .iter()
                .find(|item| !item.eq_ignore_ascii_case("compatible"))
                .map(|s| s.to_string())
                .unwrap_or_default(),
            os: operating_system(&comment),
            mobile: MOBILE.is_match(user_agent),
            ..UserAgentInfo::default()
        };

        if let Some((engine, version)) = engine(user_agent) {
            info.engine = engine;
            info.engine_version = version;
        }

        if let Some(caps) = HTTP_CLIENT.captures(user_agent).or_else(|| BOT.captures(user_agent)) {
            info.bot = true;
            info.browser = caps[1].to_string();
            info.browser_version = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            return info;
        }

        match BROWSERS.iter().find_map(|r| r.pattern.captures(user_agent).map(|c| (r.name, c))) {
            Some((name, caps)) => {
                info.browser = name.to_string();
                info.browser_version = caps[1].to_string();
            }
            None => {
                if let Some(caps) = PRODUCT.captures(user_agent) {
                    info.browser = caps[1].to_string();
                    info.browser_version =
                        caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                }
            }
        }

        info
    }
}

fn engine(user_agent: &str) -> Option<(String, String)> {
    if let Some(caps) = ENGINE.captures(user_agent) {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }
    let gecko = GECKO.captures(user_agent)?;
    let version = GECKO_RV
        .captures(user_agent)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| gecko[1].to_string());
    Some(("Gecko".to_string(), version))
}

fn operating_system(comment: &[&str]) -> String {
    for item in comment {
        if let Some(caps) = WINDOWS_NT.captures(item) {
            let name = match &caps[1] {
                "10.0" => "Windows 10",
                "6.3" => "Windows 8.1",
                "6.2" => "Windows 8",
                "6.1" => "Windows 7",
                "6.0" => "Windows Vista",
                "5.1" | "5.2" => "Windows XP",
                other => return format!("Windows NT {}", other),
            };
            return name.to_string();
        }
    }

    let markers = ["Android", "iPhone OS", "CPU OS", "Mac OS X", "CrOS", "Windows Phone", "Linux"];
    for marker in markers {
        if let Some(item) = comment.iter().find(|item| item.contains(marker)) {
            return item.to_string();
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";
        let info = RegexUserAgentParser::new().parse(ua);
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.browser_version, "96.0.4664.110");
        assert_eq!(info.engine, "AppleWebKit");
        assert_eq!(info.os, "Windows 10");
        assert_eq!(info.platform, "Windows NT 10.0");
        assert!(!info.mobile);
        assert!(!info.bot);
    }

    #[test]
    fn test_firefox_uses_rv_for_engine_version() {
        let ua = "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:95.0) Gecko/20100101 Firefox/95.0";
        let info = RegexUserAgentParser::new().parse(ua);
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.engine, "Gecko");
        assert_eq!(info.engine_version, "95.0");
        assert_eq!(info.os, "Linux x86_64");
    }

    #[test]
    fn test_mobile_safari() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1";
        let info = RegexUserAgentParser::new().parse(ua);
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.browser_version, "14.0");
        assert_eq!(info.platform, "iPhone");
        assert_eq!(info.os, "CPU iPhone OS 14_0 like Mac OS X");
        assert!(info.mobile);
    }

    #[test]
    fn test_bots_and_clients() {
        let parser = RegexUserAgentParser::new();

        let google = parser.parse("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)");
        assert!(google.bot);
        assert_eq!(google.browser, "Googlebot");
        assert_eq!(google.browser_version, "2.1");

        let curl = parser.parse("curl/7.68.0");
        assert!(curl.bot);
        assert_eq!(curl.browser, "curl");
        assert_eq!(curl.browser_version, "7.68.0");
    }
}
