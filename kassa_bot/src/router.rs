//! Classifies inbound chat updates and drives the engine's entry points.
//!
//! The router owns the wiring rules: `/start` and plain text feed the funnel, `order_*` callbacks
//! feed the approval workflow, recognised slash-commands from administrators bypass the funnel
//! entirely, and everyone without a privileged role is gated on the service window.

use chrono::Duration;
use kassa_engine::{
    approval::Decision,
    db_types::{NewInstrument, UserId},
    funnel::{Contact, FunnelEffect, Selection, UserInput},
    traits::{ExchangeDatabase, RateProvider},
    AdminApi,
    ApprovalApi,
    AuthPolicy,
    ConversationStateMachine,
};
use log::*;

use crate::{
    config::BotConfig,
    messenger::{send_best_effort, ChatMessenger, OutboundMessage},
    render::{render_notice, render_operator_brief, render_prompt, render_service_closed, render_stats},
    schedule::ServiceSchedule,
};

/// One inbound chat update, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub contact: Contact,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// A message starting with `/`, full text included.
    Command(String),
    Text(String),
    /// A button press payload.
    Callback(String),
}

pub struct Router<B, R, M> {
    funnel: ConversationStateMachine<B, R>,
    approval: ApprovalApi<B>,
    admin: AdminApi<B>,
    auth: AuthPolicy,
    schedule: ServiceSchedule,
    messenger: M,
    extend_window: Duration,
    contact_handle: String,
    operator_id: UserId,
}

impl<B, R, M> Router<B, R, M>
where
    B: ExchangeDatabase,
    R: RateProvider,
    M: ChatMessenger,
{
    pub fn new(db: B, rates: R, messenger: M, schedule: ServiceSchedule, config: &BotConfig) -> Self {
        let auth = config.auth_policy();
        Self {
            funnel: ConversationStateMachine::new(db.clone(), rates, config.captcha_timeout),
            approval: ApprovalApi::new(db.clone(), auth.clone()),
            admin: AdminApi::new(db, auth.clone()),
            auth,
            schedule,
            messenger,
            extend_window: config.extend_window,
            contact_handle: config.contact_handle.clone(),
            operator_id: config.operator_id,
        }
    }

    pub async fn dispatch(&self, update: InboundUpdate) {
        let chat = update.contact.chat_id;
        trace!("📮️ Update from chat {chat}: {:?}", update.kind);
        match update.kind {
            UpdateKind::Command(text) => self.on_command(update.contact, text).await,
            UpdateKind::Callback(data) => self.on_callback(update.contact, data).await,
            UpdateKind::Text(text) => {
                if self.gate(chat).await {
                    self.drive_funnel(update.contact, UserInput::Text(text)).await;
                }
            },
        }
    }

    async fn on_command(&self, contact: Contact, text: String) {
        let chat = contact.chat_id;
        let mut words = text.split_whitespace();
        let command = words.next().unwrap_or("");
        if command == "/start" {
            if self.gate(chat).await {
                self.drive_funnel(contact, UserInput::Start).await;
            }
            return;
        }
        if command == "/extend" && self.auth.is_operator(chat) {
            let window =
                words.next().and_then(|m| m.parse::<i64>().ok()).map(Duration::minutes).unwrap_or(self.extend_window);
            let until = self.schedule.extend(window).await;
            self.reply(chat, format!("Service window open until {until}.")).await;
            return;
        }
        // Recognised slash-commands from administrators bypass the funnel entirely
        if self.auth.is_admin(chat) {
            if let Some(parsed) = parse_admin_command(&text) {
                match parsed {
                    Ok(command) => self.run_admin_command(chat, command).await,
                    Err(usage) => self.reply(chat, usage).await,
                }
                return;
            }
        }
        if self.gate(chat).await {
            self.drive_funnel(contact, UserInput::Text(text)).await;
        }
    }

    async fn on_callback(&self, contact: Contact, data: String) {
        let chat = contact.chat_id;
        if let Some((order_id, decision)) = parse_operator_callback(&data) {
            if self.auth.is_operator(chat) {
                self.on_decision(chat, order_id, decision).await;
                return;
            }
            debug!("📮️ Chat {chat} pressed an operator button without being the operator");
        }
        let input = match parse_selection(&data) {
            Some(selection) => UserInput::Select(selection),
            None => UserInput::Text(data),
        };
        if self.gate(chat).await {
            self.drive_funnel(contact, input).await;
        }
    }

    async fn on_decision(&self, actor: UserId, order_id: i64, decision: Decision) {
        match self.approval.decide(actor, order_id, decision).await {
            Ok(outcome) => {
                let verdict = match decision {
                    Decision::Approve => "approved",
                    Decision::Reject => "rejected",
                    Decision::BlockOriginator => "left pending; the originator is now blocked",
                };
                self.reply(actor, format!("Order #{order_id}: {verdict}.")).await;
                if let Some((submitter, notice)) = outcome.notice {
                    send_best_effort(&self.messenger, OutboundMessage::new(submitter, render_notice(notice, order_id)))
                        .await;
                }
            },
            Err(e) => {
                warn!("🧾 Decision on order #{order_id} failed: {e}");
                self.reply(actor, format!("Could not apply the decision: {e}")).await;
            },
        }
    }

    async fn run_admin_command(&self, actor: UserId, command: AdminCommand) {
        let reply = match command {
            AdminCommand::SetCommission(rate) => {
                self.admin.set_commission(actor, rate).await.map(|rate| format!("Commission set to {rate}%."))
            },
            AdminCommand::AddInstrument(instrument) => self
                .admin
                .add_instrument(actor, instrument)
                .await
                .map(|i| format!("Added instrument #{} ({}).", i.id, i.bank_name)),
            AdminCommand::RemoveInstrument(id) => self
                .admin
                .remove_instrument(actor, id)
                .await
                .map(|i| format!("Removed instrument #{} ({}).", i.id, i.bank_name)),
            AdminCommand::ListInstruments => self.admin.list_instruments(actor).await.map(|list| {
                if list.is_empty() {
                    "No instruments configured.".to_string()
                } else {
                    list.iter()
                        .map(|i| format!("#{} {} {} ({})", i.id, i.bank_name, i.account_number, i.recipient_name))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }),
            AdminCommand::ListBlocked => self.admin.blocked_sessions(actor).await.map(|list| {
                if list.is_empty() {
                    "Nobody is blocked.".to_string()
                } else {
                    list.iter().map(|s| format!("{} ({})", s.chat_id, s.display_name())).collect::<Vec<_>>().join("\n")
                }
            }),
            AdminCommand::Unblock(chat) => match self.admin.unblock(actor, chat).await {
                Ok(session) => {
                    let notice = OutboundMessage::new(session.chat_id, "You have been unblocked. Welcome back.");
                    send_best_effort(&self.messenger, notice).await;
                    Ok(format!("Chat {chat} unblocked."))
                },
                Err(e) => Err(e),
            },
            AdminCommand::Stats => self.admin.statistics(actor).await.map(|stats| render_stats(&stats)),
            AdminCommand::AuditLog => self.admin.audit_trail(actor, 20).await.map(|entries| {
                if entries.is_empty() {
                    "The audit log is empty.".to_string()
                } else {
                    entries
                        .iter()
                        .map(|e| format!("[{}] {}: {}", e.logged_at.format("%Y-%m-%d %H:%M"), e.admin_id, e.action))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }),
        };
        match reply {
            Ok(text) => self.reply(actor, text).await,
            Err(e) => self.reply(actor, format!("⚠️ {e}")).await,
        }
    }

    async fn drive_funnel(&self, contact: Contact, input: UserInput) {
        let chat = contact.chat_id;
        match self.funnel.handle(contact, input).await {
            Ok(effects) => {
                for effect in effects {
                    match effect {
                        FunnelEffect::Reply(prompt) => {
                            self.reply(chat, render_prompt(&prompt, &self.contact_handle)).await;
                        },
                        FunnelEffect::NotifyOperator(brief) => {
                            let message = OutboundMessage::new(self.operator_id, render_operator_brief(&brief));
                            send_best_effort(&self.messenger, message).await;
                        },
                    }
                }
            },
            Err(e) => {
                error!("🎯 Funnel error for chat {chat}: {e}");
                self.reply(chat, "Something went wrong on our side. Please try that again.").await;
            },
        }
    }

    /// Ordinary users only get through while the service window is open. Admins and the operator
    /// are always let in.
    async fn gate(&self, chat: UserId) -> bool {
        if self.auth.is_admin(chat) || self.auth.is_operator(chat) || self.schedule.is_active().await {
            return true;
        }
        self.reply(chat, render_service_closed(&self.contact_handle)).await;
        false
    }

    async fn reply(&self, chat: UserId, text: impl Into<String>) {
        send_best_effort(&self.messenger, OutboundMessage::new(chat, text)).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AdminCommand {
    SetCommission(f64),
    AddInstrument(NewInstrument),
    RemoveInstrument(i64),
    ListInstruments,
    ListBlocked,
    Unblock(UserId),
    Stats,
    AuditLog,
}

/// `None` for anything that is not an admin command; `Some(Err(usage))` for a recognised command
/// with bad arguments.
pub(crate) fn parse_admin_command(text: &str) -> Option<Result<AdminCommand, String>> {
    let mut words = text.split_whitespace();
    let command = words.next()?;
    let args: Vec<&str> = words.collect();
    let parsed = match command {
        "/commission" => match args.first().and_then(|s| s.parse::<f64>().ok()) {
            Some(rate) => Ok(AdminCommand::SetCommission(rate)),
            None => Err("Usage: /commission <percent>".to_string()),
        },
        "/addcard" => {
            if args.len() < 3 {
                Err("Usage: /addcard <bank> <account-number> <recipient>".to_string())
            } else {
                Ok(AdminCommand::AddInstrument(NewInstrument {
                    bank_name: args[0].to_string(),
                    account_number: args[1].to_string(),
                    recipient_name: args[2..].join(" "),
                }))
            }
        },
        "/removecard" => match args.first().and_then(|s| s.parse::<i64>().ok()) {
            Some(id) => Ok(AdminCommand::RemoveInstrument(id)),
            None => Err("Usage: /removecard <id>".to_string()),
        },
        "/cards" => Ok(AdminCommand::ListInstruments),
        "/blocked" => Ok(AdminCommand::ListBlocked),
        "/unblock" => match args.first().and_then(|s| s.parse::<i64>().ok()) {
            Some(chat) => Ok(AdminCommand::Unblock(UserId(chat))),
            None => Err("Usage: /unblock <chat-id>".to_string()),
        },
        "/stats" => Ok(AdminCommand::Stats),
        "/log" => Ok(AdminCommand::AuditLog),
        _ => return None,
    };
    Some(parsed)
}

/// Parses `order_<id>_<approve|reject|block>` operator buttons.
pub(crate) fn parse_operator_callback(data: &str) -> Option<(i64, Decision)> {
    let rest = data.strip_prefix("order_")?;
    let (id, action) = rest.split_once('_')?;
    let id = id.parse().ok()?;
    let decision = match action {
        "approve" => Decision::Approve,
        "reject" => Decision::Reject,
        "block" => Decision::BlockOriginator,
        _ => return None,
    };
    Some((id, decision))
}

/// Maps button payloads onto funnel selections.
pub(crate) fn parse_selection(data: &str) -> Option<Selection> {
    let selection = match data {
        "buy" => Selection::BuyCrypto,
        "profile" => Selection::Profile,
        "paid" => Selection::ConfirmPaid,
        "decline" => Selection::DeclinePayment,
        "cancel" => Selection::Cancel,
        "back" => Selection::Back,
        other => {
            if let Some(asset) = other.strip_prefix("asset:") {
                Selection::Asset(asset.to_string())
            } else if let Some(bank) = other.strip_prefix("bank:") {
                Selection::Instrument(bank.to_string())
            } else {
                return None;
            }
        },
    };
    Some(selection)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn operator_callbacks_parse() {
        assert_eq!(parse_operator_callback("order_42_approve"), Some((42, Decision::Approve)));
        assert_eq!(parse_operator_callback("order_7_reject"), Some((7, Decision::Reject)));
        assert_eq!(parse_operator_callback("order_9_block"), Some((9, Decision::BlockOriginator)));
        assert_eq!(parse_operator_callback("order_9_promote"), None);
        assert_eq!(parse_operator_callback("order_abc_approve"), None);
        assert_eq!(parse_operator_callback("buy"), None);
    }

    #[test]
    fn selections_parse() {
        assert_eq!(parse_selection("buy"), Some(Selection::BuyCrypto));
        assert_eq!(parse_selection("asset:BTC"), Some(Selection::Asset("BTC".to_string())));
        assert_eq!(parse_selection("bank:Sberbank"), Some(Selection::Instrument("Sberbank".to_string())));
        assert_eq!(parse_selection("cancel"), Some(Selection::Cancel));
        assert_eq!(parse_selection("order_1_approve"), None);
        assert_eq!(parse_selection("mystery"), None);
    }

    #[test]
    fn admin_commands_parse() {
        assert_eq!(parse_admin_command("/commission 3.5"), Some(Ok(AdminCommand::SetCommission(3.5))));
        assert!(matches!(parse_admin_command("/commission lots"), Some(Err(_))));
        let Some(Ok(AdminCommand::AddInstrument(instrument))) =
            parse_admin_command("/addcard Sberbank 1234567890123456 Ivan I.")
        else {
            panic!("addcard should parse");
        };
        assert_eq!(instrument.bank_name, "Sberbank");
        assert_eq!(instrument.account_number, "1234567890123456");
        assert_eq!(instrument.recipient_name, "Ivan I.");
        assert_eq!(parse_admin_command("/unblock 300"), Some(Ok(AdminCommand::Unblock(UserId(300)))));
        assert_eq!(parse_admin_command("/stats"), Some(Ok(AdminCommand::Stats)));
        // Not admin commands at all: the funnel gets them
        assert_eq!(parse_admin_command("/start"), None);
        assert_eq!(parse_admin_command("hello"), None);
    }
}
