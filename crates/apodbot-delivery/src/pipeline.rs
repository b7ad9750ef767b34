//! Delivery pipeline — one picture delivery to one target.
//!
//! ```text
//! resolve bot ─► ensure data ─► classify media ─┬─► translate ─► send text+image ─► attach `explain`
//!      │               │               │        └─► compose ───► send card ───────► attach `original`
//!   (offline)     (fetch failed)    (video)
//!      ▼               ▼               ▼
//!    stop        failure notice   video notice
//! ```
//!
//! Every collaborator error ends here. Nothing propagates back into the
//! trigger engine; callers get a [`DeliveryOutcome`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use apodbot_core::config::DeliveryConfig;
use apodbot_core::error::{ApodError, Result};
use apodbot_core::registry::BotRegistry;
use apodbot_core::time::parse_apod_date;
use apodbot_core::traits::{Messenger, PictureSource, Renderer, Translator};
use apodbot_core::types::{OutgoingMessage, PictureOfDay, Segment, Target};
use apodbot_scheduler::{CacheEvictor, DeliveryHandler};
use async_trait::async_trait;

use crate::argot::{self, ArgotStore};
use crate::cache::{ComposedImageCache, PictureCache};
use crate::compose::{Composer, translate_or_original};

const TODAY_LEAD: &str = "今日天文一图为";
const TODAY_FETCH_FAILED: &str = "获取今日天文一图失败,请稍后再试";
const TODAY_IS_VIDEO: &str = "今日 NASA 提供的为天文视频";
const COMPOSE_FAILED: &str = "发送今日的天文一图失败";
const SEND_FAILED: &str = "发送 NASA 每日天文一图时发生错误";

/// User-facing texts and argot name for a one-shot lookup.
struct OneShot {
    fetch_failed: &'static str,
    is_video: &'static str,
    argot_name: &'static str,
}

const RANDOM: OneShot = OneShot {
    fetch_failed: "获取随机天文一图失败,请稍后再试。",
    is_video: "随机到了天文视频",
    argot_name: "randomly_apod_explanation",
};

const BY_DATE: OneShot = OneShot {
    fetch_failed: "获取指定日期天文一图失败,请稍后再试。",
    is_video: "指定日期的天文一图为视频",
    argot_name: "date_apod_explanation",
};

/// What started a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A daily job fired.
    Scheduled,
    /// A chat command; replies go to `reply_to`.
    Command { reply_to: Option<String> },
}

impl Trigger {
    fn reply_to(&self) -> Option<String> {
        match self {
            Trigger::Scheduled => None,
            Trigger::Command { reply_to } => reply_to.clone(),
        }
    }

    fn is_command(&self) -> bool {
        matches!(self, Trigger::Command { .. })
    }
}

/// Picture request from the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureCommand {
    Today,
    Random,
    /// Raw `YYYY-MM-DD`, validated by the pipeline.
    ByDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { message_id: String },
    /// No live bot for the target; nothing was sent.
    BotOffline,
    /// The entry is not a still image; a notice was sent.
    NotAnImage,
    /// A collaborator failed; a notice was sent unless policy suppressed it.
    Failed(String),
}

/// Today's picture for the image branch: the still-image URL, or the reason
/// it cannot be sent as an image.
fn classify(picture: &PictureOfDay) -> Result<&str> {
    picture.image_url().ok_or_else(|| {
        ApodError::MediaTypeMismatch(format!("{} is {:?}", picture.date, picture.media_type))
    })
}

pub struct DeliveryPipeline {
    registry: Arc<BotRegistry>,
    source: Arc<dyn PictureSource>,
    translator: Arc<dyn Translator>,
    composer: Composer,
    pictures: PictureCache,
    composed: ComposedImageCache,
    argots: ArgotStore,
    config: DeliveryConfig,
}

impl DeliveryPipeline {
    pub fn new(
        registry: Arc<BotRegistry>,
        source: Arc<dyn PictureSource>,
        translator: Arc<dyn Translator>,
        renderer: Arc<dyn Renderer>,
        cache_dir: &Path,
        config: DeliveryConfig,
    ) -> Self {
        let composer = Composer::new(
            Arc::clone(&translator),
            renderer,
            config.dark_mode,
            config.render_width,
        );
        Self {
            registry,
            source,
            translator,
            composer,
            pictures: PictureCache::new(cache_dir),
            composed: ComposedImageCache::new(),
            argots: ArgotStore::new(),
            config,
        }
    }

    pub fn picture_cache(&self) -> &PictureCache {
        &self.pictures
    }

    pub fn composed_cache(&self) -> &ComposedImageCache {
        &self.composed
    }

    pub fn argots(&self) -> &ArgotStore {
        &self.argots
    }

    fn argot_ttl(&self) -> Duration {
        Duration::from_secs(self.config.argot_expiry_secs)
    }

    async fn resolve_bot(&self, target: &Target) -> Option<Arc<dyn Messenger>> {
        let bot = self.registry.resolve(target).await;
        if bot.is_none() {
            tracing::warn!("🔌 No live bot for {target}, skipping delivery");
        }
        bot
    }

    /// Today's picture through the cached path.
    pub async fn deliver_today(&self, target: &Target, trigger: Trigger) -> DeliveryOutcome {
        let Some(bot) = self.resolve_bot(target).await else {
            return DeliveryOutcome::BotOffline;
        };
        let reply_to = trigger.reply_to();

        let picture = match self.pictures.ensure(self.source.as_ref()).await {
            Ok(picture) => picture,
            Err(e) => {
                tracing::error!("❌ Fetching today's APOD for {target} failed: {e}");
                if trigger.is_command() || self.config.notify_on_scheduled_failure {
                    notify(bot.as_ref(), target, TODAY_FETCH_FAILED, reply_to).await;
                }
                return DeliveryOutcome::Failed(e.to_string());
            }
        };

        let url = match classify(&picture) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::info!("🎬 {e}, sending notice to {target}");
                notify(bot.as_ref(), target, TODAY_IS_VIDEO, reply_to).await;
                return DeliveryOutcome::NotAnImage;
            }
        };

        if self.config.infopuzzle {
            self.send_card(bot.as_ref(), target, &picture, &trigger).await
        } else {
            self.send_plain(
                bot.as_ref(),
                target,
                &picture,
                &url,
                Some(TODAY_LEAD),
                "explanation",
                reply_to,
            )
            .await
        }
    }

    /// Run a chat picture command. Only an invalid date is returned as an
    /// error; every other failure is reported to the chat.
    pub async fn run_command(
        &self,
        target: &Target,
        command: PictureCommand,
        reply_to: Option<String>,
    ) -> Result<DeliveryOutcome> {
        match command {
            PictureCommand::Today => Ok(self.deliver_today(target, Trigger::Command { reply_to }).await),
            PictureCommand::Random => {
                let Some(bot) = self.resolve_bot(target).await else {
                    return Ok(DeliveryOutcome::BotOffline);
                };
                let fetched = self.source.fetch_random().await;
                Ok(self.deliver_one_shot(bot.as_ref(), target, fetched, &RANDOM, reply_to).await)
            }
            PictureCommand::ByDate(raw) => {
                let date = parse_apod_date(&raw)?;
                let Some(bot) = self.resolve_bot(target).await else {
                    return Ok(DeliveryOutcome::BotOffline);
                };
                let fetched = self.source.fetch_by_date(date).await;
                Ok(self.deliver_one_shot(bot.as_ref(), target, fetched, &BY_DATE, reply_to).await)
            }
        }
    }

    /// Send the argot attached to `message_id` under `keyword`, if still live.
    pub async fn answer_argot(
        &self,
        target: &Target,
        message_id: &str,
        keyword: &str,
        reply_to: Option<String>,
    ) -> Result<bool> {
        let Some(found) = self.argots.lookup(target, message_id, keyword) else {
            return Ok(false);
        };
        let Some(bot) = self.resolve_bot(target).await else {
            return Ok(false);
        };
        let message = OutgoingMessage::default()
            .push(found.segment)
            .replying_to(reply_to);
        bot.send(target, message).await?;
        Ok(true)
    }

    async fn deliver_one_shot(
        &self,
        bot: &dyn Messenger,
        target: &Target,
        fetched: Result<Option<PictureOfDay>>,
        texts: &OneShot,
        reply_to: Option<String>,
    ) -> DeliveryOutcome {
        let picture = match fetched {
            Ok(Some(picture)) => picture,
            Ok(None) => {
                notify(bot, target, texts.fetch_failed, reply_to).await;
                return DeliveryOutcome::Failed("no entry returned".into());
            }
            Err(e) => {
                tracing::error!("❌ APOD lookup for {target} failed: {e}");
                notify(bot, target, texts.fetch_failed, reply_to).await;
                return DeliveryOutcome::Failed(e.to_string());
            }
        };

        let url = match classify(&picture) {
            Ok(url) => url.to_string(),
            Err(_) => {
                notify(bot, target, texts.is_video, reply_to).await;
                return DeliveryOutcome::NotAnImage;
            }
        };
        self.send_plain(bot, target, &picture, &url, None, texts.argot_name, reply_to)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_plain(
        &self,
        bot: &dyn Messenger,
        target: &Target,
        picture: &PictureOfDay,
        url: &str,
        lead: Option<&str>,
        argot_name: &str,
        reply_to: Option<String>,
    ) -> DeliveryOutcome {
        let explanation = translate_or_original(self.translator.as_ref(), &picture.explanation).await;

        let mut message = OutgoingMessage::default().replying_to(reply_to.clone());
        if let Some(lead) = lead {
            message = message.push(Segment::Text(lead.to_string()));
        }
        message = message.push(Segment::ImageUrl(url.to_string()));

        match bot.send(target, message).await {
            Ok(receipt) => {
                self.argots.attach(
                    target,
                    &receipt.message_id,
                    argot_name,
                    argot::EXPLAIN,
                    Segment::Text(explanation),
                    self.argot_ttl(),
                );
                tracing::info!("📨 APOD {} sent to {target}", picture.date);
                DeliveryOutcome::Delivered {
                    message_id: receipt.message_id,
                }
            }
            Err(e) => report_send_failure(bot, target, e, reply_to).await,
        }
    }

    async fn send_card(
        &self,
        bot: &dyn Messenger,
        target: &Target,
        picture: &PictureOfDay,
        trigger: &Trigger,
    ) -> DeliveryOutcome {
        let reply_to = trigger.reply_to();
        let card = match self.composed.get(&picture.date).await {
            Some(bytes) => bytes,
            None => match self.composer.compose(picture).await {
                Ok(bytes) => {
                    self.composed.set(&picture.date, bytes.clone()).await;
                    bytes
                }
                Err(e) => {
                    tracing::error!("❌ Composing APOD card failed: {e}");
                    notify(bot, target, COMPOSE_FAILED, reply_to).await;
                    return DeliveryOutcome::Failed(e.to_string());
                }
            },
        };

        let message = OutgoingMessage::default()
            .push(Segment::ImageBytes(card))
            .replying_to(reply_to.clone());
        let outcome = match bot.send(target, message).await {
            Ok(receipt) => {
                if let Some(original) = picture.preferred_url(self.config.hd_image) {
                    self.argots.attach(
                        target,
                        &receipt.message_id,
                        "background",
                        argot::ORIGINAL,
                        Segment::ImageUrl(original.to_string()),
                        self.argot_ttl(),
                    );
                }
                tracing::info!("🧩 APOD card {} sent to {target}", picture.date);
                DeliveryOutcome::Delivered {
                    message_id: receipt.message_id,
                }
            }
            Err(e) => report_send_failure(bot, target, e, reply_to).await,
        };

        if trigger.is_command() && self.config.consume_composed_on_command {
            self.composed.evict().await;
        }
        outcome
    }
}

/// Best-effort text notice; a failure here is only logged.
async fn notify(bot: &dyn Messenger, target: &Target, text: &str, reply_to: Option<String>) {
    let message = OutgoingMessage::text(text).replying_to(reply_to);
    if let Err(e) = bot.send(target, message).await {
        tracing::warn!("Notice to {target} not delivered: {e}");
    }
}

async fn report_send_failure(
    bot: &dyn Messenger,
    target: &Target,
    error: ApodError,
    reply_to: Option<String>,
) -> DeliveryOutcome {
    if error.is_collaborator_failure() {
        tracing::warn!("⚠️ Sending APOD to {target} failed: {error}");
    } else {
        tracing::error!("❌ Sending APOD to {target} failed: {error}");
    }
    notify(bot, target, SEND_FAILED, reply_to).await;
    DeliveryOutcome::Failed(error.to_string())
}

#[async_trait]
impl DeliveryHandler for DeliveryPipeline {
    async fn deliver(&self, target: Target) {
        let outcome = self.deliver_today(&target, Trigger::Scheduled).await;
        tracing::debug!("Scheduled delivery to {target}: {outcome:?}");
    }
}

#[async_trait]
impl CacheEvictor for DeliveryPipeline {
    async fn evict(&self) {
        let picture = self.pictures.evict().await;
        let composed = self.composed.evict().await;
        tracing::debug!("Cache eviction: picture={picture}, composed={composed}");
    }
}
