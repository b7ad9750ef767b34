//! Chat command front-end. Decodes chat text once into typed commands and
//! routes them to the scheduler service or the delivery pipeline.

use std::sync::Arc;

use apodbot_core::error::ApodError;
use apodbot_core::registry::BotRegistry;
use apodbot_core::traits::Messenger;
use apodbot_core::types::{IncomingMessage, OutgoingMessage, Target};
use apodbot_delivery::{DeliveryPipeline, PictureCommand, keyword_for};
use apodbot_scheduler::{ScheduleCommand, ScheduleReply, SchedulerService};

const USAGE: &str = "用法: /apod 状态; /apod 关闭; /apod 开启 13:30";
const BAD_TIME: &str = "时间格式不正确,请使用 HH:MM 格式";
const BAD_DATE: &str = "日期格式不正确,请使用 YYYY-MM-DD 格式,且日期需要在 1995-06-16 之后";
const SCHEDULE_FAILED: &str = "设置 NASA 每日天文一图定时任务时发生错误";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Schedule(ScheduleCommand),
    Picture(PictureCommand),
    /// Reply to a sent picture asking for its attached metadata.
    Argot(&'static str),
    /// `/apod` with missing or unknown arguments.
    Usage,
}

/// Decode a chat message. `is_reply` enables argot keywords.
pub fn parse(content: &str, is_reply: bool) -> Option<Command> {
    let content = content.trim();
    let Some(rest) = content.strip_prefix('/') else {
        return if is_reply {
            keyword_for(content).map(Command::Argot)
        } else {
            None
        };
    };

    let mut words = rest.split_whitespace();
    let head = words.next()?;
    // Telegram appends "@botname" to commands in groups.
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    match name.as_str() {
        "apod" => Some(match (words.next(), words.next()) {
            (Some("status" | "状态"), None) => Command::Schedule(ScheduleCommand::Status),
            (Some("stop" | "关闭"), None) => Command::Schedule(ScheduleCommand::Stop),
            (Some("start" | "开启"), time) => {
                Command::Schedule(ScheduleCommand::Start(time.map(str::to_string)))
            }
            _ => Command::Usage,
        }),
        "apod_today" | "今日天文一图" => Some(Command::Picture(PictureCommand::Today)),
        "apod_random" | "随机天文一图" => Some(Command::Picture(PictureCommand::Random)),
        "apod_date" | "指定日期天文一图" => Some(Command::Picture(PictureCommand::ByDate(
            words.next().unwrap_or_default().to_string(),
        ))),
        _ => None,
    }
}

/// Chat text for a schedule command result.
pub fn render_reply(reply: &ScheduleReply) -> String {
    match reply {
        ScheduleReply::Status(status) if !status.running => {
            "NASA 每日天文一图定时任务未开启".to_string()
        }
        ScheduleReply::Status(status) => {
            let next = status
                .next_fire
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "未知".to_string());
            format!("NASA 每日天文一图定时任务已开启 | 下次发送时间: {next}")
        }
        ScheduleReply::Stopped { .. } => "已关闭 NASA 每日天文一图定时任务".to_string(),
        ScheduleReply::Started(report) if report.used_default => format!(
            "已开启 NASA 每日天文一图定时任务,默认发送时间为 {}",
            report.send_time
        ),
        ScheduleReply::Started(report) => format!(
            "已开启 NASA 每日天文一图定时任务,发送时间为 {}",
            report.send_time
        ),
    }
}

/// Routes incoming chat messages.
pub struct Frontend {
    service: Arc<SchedulerService>,
    pipeline: Arc<DeliveryPipeline>,
    registry: Arc<BotRegistry>,
    superusers: Vec<String>,
    enabled: bool,
}

impl Frontend {
    pub fn new(
        service: Arc<SchedulerService>,
        pipeline: Arc<DeliveryPipeline>,
        registry: Arc<BotRegistry>,
        superusers: Vec<String>,
        enabled: bool,
    ) -> Self {
        Self {
            service,
            pipeline,
            registry,
            superusers,
            enabled,
        }
    }

    fn is_superuser(&self, sender_id: &str) -> bool {
        self.superusers.iter().any(|id| id == sender_id)
    }

    pub async fn handle(&self, msg: IncomingMessage) {
        let Some(command) = parse(&msg.content, msg.reply_to.is_some()) else {
            return;
        };
        if !self.enabled {
            tracing::debug!("Ignoring {command:?}: NASA api key not configured");
            return;
        }

        let target = msg.target();
        let reply_to = Some(msg.message_id.clone());
        tracing::info!("💬 {command:?} from {} in {target}", msg.sender_id);

        match command {
            Command::Schedule(cmd) => {
                if !self.is_superuser(&msg.sender_id) {
                    tracing::debug!("{} is not a superuser, ignoring", msg.sender_id);
                    return;
                }
                let text = match self.service.handle(&target, cmd).await {
                    Ok(reply) => render_reply(&reply),
                    Err(ApodError::InvalidTimeFormat(_)) => BAD_TIME.to_string(),
                    Err(e) => {
                        tracing::error!("❌ Schedule command for {target} failed: {e}");
                        SCHEDULE_FAILED.to_string()
                    }
                };
                self.reply(&target, text, reply_to).await;
            }
            Command::Picture(cmd) => {
                match self.pipeline.run_command(&target, cmd, reply_to.clone()).await {
                    Ok(outcome) => tracing::debug!("Command delivery to {target}: {outcome:?}"),
                    Err(ApodError::InvalidDateFormat(_)) => {
                        self.reply(&target, BAD_DATE.to_string(), reply_to).await;
                    }
                    Err(e) => tracing::error!("❌ Picture command for {target} failed: {e}"),
                }
            }
            Command::Argot(keyword) => {
                let Some(original) = msg.reply_to.as_deref() else {
                    return;
                };
                if let Err(e) = self
                    .pipeline
                    .answer_argot(&target, original, keyword, reply_to)
                    .await
                {
                    tracing::warn!("Argot reply in {target} failed: {e}");
                }
            }
            Command::Usage => self.reply(&target, USAGE.to_string(), reply_to).await,
        }
    }

    async fn reply(&self, target: &Target, text: String, reply_to: Option<String>) {
        let Some(bot) = self.registry.resolve(target).await else {
            tracing::warn!("🔌 No live bot to answer in {target}");
            return;
        };
        if let Err(e) = bot
            .send(target, OutgoingMessage::text(text).replying_to(reply_to))
            .await
        {
            tracing::warn!("Reply in {target} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apodbot_core::time::SendTime;
    use apodbot_scheduler::{ScheduleStatus, StartReport};

    #[test]
    fn test_parse_schedule_commands() {
        assert_eq!(
            parse("/apod status", false),
            Some(Command::Schedule(ScheduleCommand::Status))
        );
        assert_eq!(
            parse("/APOD 关闭", false),
            Some(Command::Schedule(ScheduleCommand::Stop))
        );
        assert_eq!(
            parse("/apod@apod_bot 开启 13:30", false),
            Some(Command::Schedule(ScheduleCommand::Start(Some("13:30".into()))))
        );
        assert_eq!(
            parse("/apod start", false),
            Some(Command::Schedule(ScheduleCommand::Start(None)))
        );
        assert_eq!(parse("/apod", false), Some(Command::Usage));
        assert_eq!(parse("/apod status now", false), Some(Command::Usage));
    }

    #[test]
    fn test_parse_picture_commands() {
        assert_eq!(
            parse("/apod_today", false),
            Some(Command::Picture(PictureCommand::Today))
        );
        assert_eq!(
            parse("/随机天文一图", false),
            Some(Command::Picture(PictureCommand::Random))
        );
        assert_eq!(
            parse("/apod_date 2023-10-01", false),
            Some(Command::Picture(PictureCommand::ByDate("2023-10-01".into())))
        );
        assert_eq!(
            parse("/apod_date", false),
            Some(Command::Picture(PictureCommand::ByDate(String::new())))
        );
    }

    #[test]
    fn test_parse_argot_only_on_reply() {
        assert_eq!(parse("简介", true), Some(Command::Argot(apodbot_delivery::EXPLAIN)));
        assert_eq!(parse("original", true), Some(Command::Argot(apodbot_delivery::ORIGINAL)));
        assert_eq!(parse("简介", false), None);
        assert_eq!(parse("nice picture", true), None);
        assert_eq!(parse("/help", false), None);
    }

    #[test]
    fn test_render_replies() {
        let idle = ScheduleReply::Status(ScheduleStatus {
            running: false,
            next_fire: None,
        });
        assert_eq!(render_reply(&idle), "NASA 每日天文一图定时任务未开启");

        let running = ScheduleReply::Status(ScheduleStatus {
            running: true,
            next_fire: None,
        });
        assert!(render_reply(&running).ends_with("未知"));

        let started = ScheduleReply::Started(StartReport {
            send_time: SendTime::new(13, 0).unwrap(),
            used_default: true,
            next_fire: None,
        });
        assert_eq!(
            render_reply(&started),
            "已开启 NASA 每日天文一图定时任务,默认发送时间为 13:00"
        );
    }
}
