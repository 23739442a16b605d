//! Tool dispatch: turn a parsed [`Directive`] into a side effect and a
//! substitution the reply can carry.
//!
//! Every backend call runs under the tool timeout. Failures come back as a
//! [`ToolFailure`] value and never abort the turn; the gateway renders them.

pub mod remind;
pub mod stock;

use crate::directives::Directive;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use sauti_core::{
    config::ToolsConfig,
    error::{with_timeout, SautiError},
    records::{NewReminder, Quote},
    traits::{MarketData, ReminderStore, SearchBackend},
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Who asked, and where a reminder should be delivered.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub owner_id: String,
    pub channel: String,
    pub channel_id: String,
    pub now: DateTime<Utc>,
}

/// Successful tool outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    ReminderSet { when: String, task: String },
    Media { url: String },
    Video { url: String },
    Quote(Quote),
}

/// Why a tool produced no result.
#[derive(Debug)]
pub enum ToolFailure {
    /// The backend answered but had nothing for the query.
    NotFound,
    /// The directive arguments could not be interpreted.
    Unparseable,
    /// A reminder time was understood but has already gone by.
    Past,
    /// The backend or store failed or timed out.
    Upstream(SautiError),
}

impl From<SautiError> for ToolFailure {
    fn from(e: SautiError) -> Self {
        Self::Upstream(e)
    }
}

/// Executes directives against the search, market-data and reminder backends.
pub struct ToolDispatcher {
    search: Arc<dyn SearchBackend>,
    market: Arc<dyn MarketData>,
    reminders: Arc<dyn ReminderStore>,
    settings: ToolsConfig,
    tz: Tz,
}

impl ToolDispatcher {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        market: Arc<dyn MarketData>,
        reminders: Arc<dyn ReminderStore>,
        settings: ToolsConfig,
        tz: Tz,
    ) -> Self {
        Self {
            search,
            market,
            reminders,
            settings,
            tz,
        }
    }

    /// Run one directive.
    pub async fn resolve(
        &self,
        directive: &Directive,
        ctx: &ToolContext,
    ) -> Result<Substitution, ToolFailure> {
        let result = match directive {
            Directive::Remind { when, task } => self.remind(when, task, ctx).await,
            Directive::Gif { query } => self.media(query, true).await,
            Directive::Img { query } => self.media(query, false).await,
            Directive::Video { query } => self.video(query).await,
            Directive::Stock { symbol } => self.stock(symbol).await,
        };
        if let Err(ToolFailure::Upstream(e)) = &result {
            let kind = directive.kind().as_str();
            if e.is_upstream() {
                warn!("{kind} backend unavailable: {e}");
            } else {
                error!("{kind} tool failed: {e}");
            }
        }
        result
    }

    async fn remind(
        &self,
        when: &str,
        task: &str,
        ctx: &ToolContext,
    ) -> Result<Substitution, ToolFailure> {
        let Some(due_at) = remind::parse_when(when, ctx.now, self.tz) else {
            info!("could not understand reminder time '{when}'");
            return Err(ToolFailure::Unparseable);
        };
        if due_at < ctx.now {
            info!("reminder time '{when}' resolved to {due_at}, already past");
            return Err(ToolFailure::Past);
        }

        let id = self
            .reminders
            .create_reminder(&NewReminder {
                owner_id: ctx.owner_id.clone(),
                channel: ctx.channel.clone(),
                channel_id: ctx.channel_id.clone(),
                due_at,
                text: task.to_string(),
            })
            .await?;
        info!("reminder {id} set for {} at {due_at}", ctx.owner_id);

        Ok(Substitution::ReminderSet {
            when: when.to_string(),
            task: task.to_string(),
        })
    }

    async fn media(&self, query: &str, animated: bool) -> Result<Substitution, ToolFailure> {
        let query = clean_query(query);
        if query.is_empty() {
            return Err(ToolFailure::Unparseable);
        }
        let urls = with_timeout(
            self.settings.timeout_secs,
            "image search",
            self.search.images(query, animated),
        )
        .await?;
        let url = pick(&urls, self.settings.media_pool).ok_or(ToolFailure::NotFound)?;
        Ok(Substitution::Media { url })
    }

    async fn video(&self, query: &str) -> Result<Substitution, ToolFailure> {
        let query = clean_query(query);
        if query.is_empty() {
            return Err(ToolFailure::Unparseable);
        }
        let urls = with_timeout(
            self.settings.timeout_secs,
            "video search",
            self.search.videos(query),
        )
        .await?;
        let url = urls.into_iter().next().ok_or(ToolFailure::NotFound)?;
        Ok(Substitution::Video { url })
    }

    async fn stock(&self, raw: &str) -> Result<Substitution, ToolFailure> {
        let symbol = stock::normalize_symbol(
            raw,
            &self.settings.local_tickers,
            &self.settings.local_exchange_suffix,
        );
        if symbol.is_empty() {
            return Err(ToolFailure::Unparseable);
        }
        let quote = with_timeout(
            self.settings.timeout_secs,
            "market data",
            self.market.latest_close(&symbol),
        )
        .await?;
        quote.map(Substitution::Quote).ok_or(ToolFailure::NotFound)
    }
}

/// Strip quotes and trailing punctuation the model tends to leave on queries.
fn clean_query(query: &str) -> &str {
    query.trim_matches(|c: char| matches!(c, ' ' | '"' | '.' | ',' | '!'))
}

/// Random pick among the first `pool` results.
fn pick(urls: &[String], pool: usize) -> Option<String> {
    let top = &urls[..urls.len().min(pool.max(1))];
    top.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use sauti_memory::Store;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSearch {
        images: Vec<String>,
        videos: Vec<String>,
        fail: bool,
        queries: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl SearchBackend for FakeSearch {
        async fn images(&self, query: &str, animated: bool) -> Result<Vec<String>, SautiError> {
            self.queries
                .lock()
                .unwrap()
                .push((query.to_string(), animated));
            if self.fail {
                return Err(SautiError::Tool("search down".into()));
            }
            Ok(self.images.clone())
        }

        async fn videos(&self, _query: &str) -> Result<Vec<String>, SautiError> {
            Ok(self.videos.clone())
        }

        async fn links(&self, _query: &str, _limit: usize) -> Result<Vec<String>, SautiError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeMarket {
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn latest_close(&self, symbol: &str) -> Result<Option<Quote>, SautiError> {
            self.asked.lock().unwrap().push(symbol.to_string());
            if symbol == "NOPE" {
                return Ok(None);
            }
            Ok(Some(Quote {
                symbol: symbol.to_string(),
                price: 17.5,
                currency: "KES".into(),
            }))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            owner_id: "u1".into(),
            channel: "telegram".into(),
            channel_id: "42".into(),
            now: Utc::now(),
        }
    }

    async fn dispatcher(
        search: Arc<FakeSearch>,
        market: Arc<FakeMarket>,
    ) -> (ToolDispatcher, Arc<Store>) {
        let store = Arc::new(Store::in_memory(30).await.unwrap());
        let tools = ToolDispatcher::new(
            search,
            market,
            store.clone(),
            ToolsConfig::default(),
            chrono_tz::Africa::Nairobi,
        );
        (tools, store)
    }

    #[tokio::test]
    async fn test_remind_creates_reminder() {
        let (tools, store) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let ctx = ctx();
        let directive = Directive::Remind {
            when: "in 10 minutes".into(),
            task: "drink water".into(),
        };

        let sub = tools.resolve(&directive, &ctx).await.unwrap();
        assert_eq!(
            sub,
            Substitution::ReminderSet {
                when: "in 10 minutes".into(),
                task: "drink water".into()
            }
        );

        let pending = store.reminders_for("u1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "drink water");
        assert_eq!(pending[0].channel, "telegram");
        assert_eq!(pending[0].channel_id, "42");
        let drift = (pending[0].due_at - (ctx.now + Duration::minutes(10)))
            .num_seconds()
            .abs();
        assert!(drift <= 1, "due_at off by {drift}s");
    }

    #[tokio::test]
    async fn test_remind_unparseable_creates_nothing() {
        let (tools, store) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let directive = Directive::Remind {
            when: "whenever".into(),
            task: "chill".into(),
        };

        let result = tools.resolve(&directive, &ctx()).await;
        assert!(matches!(result, Err(ToolFailure::Unparseable)));
        assert!(store.reminders_for("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remind_out_of_range_offset_is_unparseable() {
        let (tools, store) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let directive = Directive::Remind {
            when: "in 100000000 days".into(),
            task: "x".into(),
        };

        let result = tools.resolve(&directive, &ctx()).await;
        assert!(matches!(result, Err(ToolFailure::Unparseable)));
        assert!(store.reminders_for("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remind_in_the_past_creates_nothing() {
        let (tools, store) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let directive = Directive::Remind {
            when: "2020-01-01 09:00".into(),
            task: "renew passport".into(),
        };

        let result = tools.resolve(&directive, &ctx()).await;
        assert!(matches!(result, Err(ToolFailure::Past)));
        assert!(store.reminders_for("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gif_picks_from_results_and_cleans_query() {
        let search = Arc::new(FakeSearch {
            images: vec!["https://a/1.gif".into(), "https://a/2.gif".into()],
            ..Default::default()
        });
        let (tools, _) = dispatcher(search.clone(), Arc::new(FakeMarket::default())).await;

        let sub = tools
            .resolve(
                &Directive::Gif {
                    query: "\"happy dance!\"".into(),
                },
                &ctx(),
            )
            .await
            .unwrap();
        match sub {
            Substitution::Media { url } => assert!(search.images.contains(&url)),
            other => panic!("unexpected {other:?}"),
        }
        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[0], ("happy dance".to_string(), true));
    }

    #[tokio::test]
    async fn test_img_not_animated() {
        let search = Arc::new(FakeSearch {
            images: vec!["https://a/1.jpg".into()],
            ..Default::default()
        });
        let (tools, _) = dispatcher(search.clone(), Arc::new(FakeMarket::default())).await;
        tools
            .resolve(
                &Directive::Img {
                    query: "sunset".into(),
                },
                &ctx(),
            )
            .await
            .unwrap();
        assert!(!search.queries.lock().unwrap()[0].1);
    }

    #[tokio::test]
    async fn test_empty_results_not_found() {
        let (tools, _) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let result = tools
            .resolve(
                &Directive::Video {
                    query: "nothing".into(),
                },
                &ctx(),
            )
            .await;
        assert!(matches!(result, Err(ToolFailure::NotFound)));
    }

    #[tokio::test]
    async fn test_search_error_is_upstream() {
        let search = Arc::new(FakeSearch {
            fail: true,
            ..Default::default()
        });
        let (tools, _) = dispatcher(search, Arc::new(FakeMarket::default())).await;
        let result = tools
            .resolve(&Directive::Gif { query: "cat".into() }, &ctx())
            .await;
        assert!(matches!(result, Err(ToolFailure::Upstream(ref e)) if e.is_upstream()));
    }

    #[tokio::test]
    async fn test_stock_symbol_mapping() {
        let market = Arc::new(FakeMarket::default());
        let (tools, _) = dispatcher(Arc::new(FakeSearch::default()), market.clone()).await;

        tools
            .resolve(&Directive::Stock { symbol: "SCOM".into() }, &ctx())
            .await
            .unwrap();
        tools
            .resolve(
                &Directive::Stock {
                    symbol: "BTC-USD".into(),
                },
                &ctx(),
            )
            .await
            .unwrap();

        let asked = market.asked.lock().unwrap();
        assert_eq!(*asked, vec!["SCOM.NR".to_string(), "BTC-USD".to_string()]);
    }

    #[tokio::test]
    async fn test_stock_without_data_not_found() {
        let (tools, _) =
            dispatcher(Arc::new(FakeSearch::default()), Arc::new(FakeMarket::default())).await;
        let result = tools
            .resolve(&Directive::Stock { symbol: "nope".into() }, &ctx())
            .await;
        assert!(matches!(result, Err(ToolFailure::NotFound)));
    }

    #[test]
    fn test_pick_respects_pool() {
        let urls: Vec<String> = (0..20).map(|i| format!("u{i}")).collect();
        for _ in 0..50 {
            let chosen = pick(&urls, 3).unwrap();
            assert!(["u0", "u1", "u2"].contains(&chosen.as_str()));
        }
        assert!(pick(&[], 5).is_none());
    }
}
