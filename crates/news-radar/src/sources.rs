use chrono::{DateTime, Utc};

/// RSS/Atom feeds polled by default.
pub const DEFAULT_FEEDS: &[&str] = &[
    // 21st Century Business Herald: finance + macro
    "http://www.21jingji.com/rss/21jingji/finance.xml",
    "http://www.21jingji.com/rss/21jingji/macro.xml",
    "http://ma.caixin.com/rss/finance.xml",
    "https://www.huxiu.com/rss/0.xml",
    "https://www.36kr.com/feed",
    "http://www.ftchinese.com/rss/news",
    "http://www.ftchinese.com/rss/markets",
    // Jiemian securities channel
    "https://a.jiemian.com/index.php?m=article&a=rss&cid=4",
    "http://business.sohu.com/rss/scroll.xml",
    "https://www.zaobao.com.sg/finance/rss.xml",
    "https://www.zhitongcaijing.com/rss.xml",
    // Third-party RSSHub mirror, may go stale
    "https://rsshub.app/wallstreetcn/news/global",
];

const SINA_LIVE_PATH: &str = "zhibo.sina.com.cn/api/zhibo/feed";
const EASTMONEY_KUAIXUN_PATH: &str = "newsapi.eastmoney.com/kuaixun/";

/// Live-feed APIs whose endpoint is itself the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredEndpoint {
    /// Sina Finance 7x24 live feed
    SinaLive,
    /// Eastmoney kuaixun flash news (JS-assignment wrapped JSON)
    EastmoneyKuaixun,
}

impl StructuredEndpoint {
    /// URL to poll right now; Sina needs a cache-busting timestamp.
    pub fn poll_url(&self, now: DateTime<Utc>) -> String {
        match self {
            StructuredEndpoint::SinaLive => format!(
                "https://{SINA_LIVE_PATH}?callback=&page=1&page_size=20&zhibo_id=152\
                 &tag_id=0&dire=f&dpc=1&type=0&_={}",
                now.timestamp_millis()
            ),
            StructuredEndpoint::EastmoneyKuaixun => {
                format!("https://{EASTMONEY_KUAIXUN_PATH}v1/getlist_102_ajaxResult_50_1_.html")
            }
        }
    }

    /// Match a candidate against the known API shapes.
    pub fn classify(url: &str) -> Option<Self> {
        if url.contains(SINA_LIVE_PATH) {
            Some(StructuredEndpoint::SinaLive)
        } else if url.contains(EASTMONEY_KUAIXUN_PATH) {
            Some(StructuredEndpoint::EastmoneyKuaixun)
        } else {
            None
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            StructuredEndpoint::SinaLive => "sina-7x24",
            StructuredEndpoint::EastmoneyKuaixun => "eastmoney-kuaixun",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// RSS 2.0 or Atom feed URL
    Feed(String),
    Structured(StructuredEndpoint),
}

/// The full default source matrix: both live APIs plus every default feed.
pub fn default_sources() -> Vec<Source> {
    let mut sources = vec![
        Source::Structured(StructuredEndpoint::SinaLive),
        Source::Structured(StructuredEndpoint::EastmoneyKuaixun),
    ];
    sources.extend(DEFAULT_FEEDS.iter().map(|url| Source::Feed(url.to_string())));
    sources
}
