//! Turns engine effects into user-facing message text. Formatting only; no logic lives here.

use kassa_engine::{
    admin::ExchangeStats,
    approval::SubmitterNotice,
    funnel::{OperatorBrief, Prompt},
};

pub fn render_prompt(prompt: &Prompt, contact_handle: &str) -> String {
    match prompt {
        Prompt::Welcome => "Welcome to Kassa! Buy BTC and LTC for rubles, straight from this chat.".to_string(),
        Prompt::Blocked => {
            format!("Your account has been blocked. Contact {contact_handle} if you believe this is a mistake.")
        },
        Prompt::CaptchaChallenge { code } => {
            format!("Quick check that you are human. Type this code back:\n\n{code}")
        },
        Prompt::CaptchaExpired { code } => {
            format!("That code expired. Here is a fresh one:\n\n{code}")
        },
        Prompt::CaptchaMismatch => "That is not the code. Try again.".to_string(),
        Prompt::CaptchaMissing => "There is no active code for you. Send /start to begin again.".to_string(),
        Prompt::CaptchaPassed => "Verified ✅".to_string(),
        Prompt::MainMenu => "Main menu:\n• Buy crypto\n• My profile".to_string(),
        Prompt::Profile(profile) => {
            let mut lines = vec![
                format!("Orders placed: {}", profile.total_orders),
                format!("Lifetime volume: {}", profile.lifetime_fiat),
            ];
            if let (Some(wallet), Some(asset)) = (&profile.last_wallet, profile.last_asset) {
                lines.push(format!("Last order: {asset} to {wallet}"));
            }
            if let Some(rate) = profile.last_rate {
                lines.push(format!("Last rate: {rate} ₽"));
            }
            lines.join("\n")
        },
        Prompt::ProfileEmpty => "You have no orders yet.".to_string(),
        Prompt::ChooseAsset { assets } => {
            let list = assets.iter().map(|a| format!("• {}", a.display_name())).collect::<Vec<_>>().join("\n");
            format!("What would you like to buy?\n{list}")
        },
        Prompt::InvalidAsset => "We do not sell that. Pick one of the listed assets.".to_string(),
        Prompt::EnterAmount { asset } => {
            format!(
                "How much {0} would you like? Enter an amount like '0.005 {0}' or '1000 ₽'.",
                asset.symbol()
            )
        },
        Prompt::InvalidAmount => "That does not look like a valid amount. Try again.".to_string(),
        Prompt::RateUnavailable => "The exchange rate is unavailable right now. Try again in a minute.".to_string(),
        Prompt::NoInstrumentsAvailable => {
            format!("No payment methods are available at the moment. Contact {contact_handle} or try again later.")
        },
        Prompt::ChooseInstrument { quote, banks } => {
            let list = banks.iter().map(|b| format!("• {b}")).collect::<Vec<_>>().join("\n");
            format!(
                "You buy {} {} at {} ₽.\nAmount: {}\nCommission ({}%): {}\nTotal to pay: {}\n\nPay via:\n{list}",
                quote.crypto_amount,
                quote.asset,
                quote.rate,
                quote.fiat_principal,
                quote.commission_percent,
                quote.commission,
                quote.total_payable,
            )
        },
        Prompt::InvalidInstrument => "That bank is not on the list. Pick one of the offered options.".to_string(),
        Prompt::EnterWalletAddress { asset } => {
            format!("Enter the {} wallet address the coins should go to.", asset.symbol())
        },
        Prompt::InvalidWalletAddress { asset } => {
            format!("That does not look like a valid {} address. Check it and try again.", asset.symbol())
        },
        Prompt::InstrumentUnavailable => "That payment method just became unavailable.".to_string(),
        Prompt::PaymentDetails { instrument, total_payable } => {
            format!(
                "Transfer {total_payable} to:\n{}\n{}\nRecipient: {}\n\nPress 'I have paid' once the transfer is \
                 done, or decline to go back.",
                instrument.bank_name, instrument.account_number, instrument.recipient_name,
            )
        },
        Prompt::PaymentRegistered { order_id } => {
            format!("Order #{order_id} registered. The operator will verify your payment shortly.")
        },
        Prompt::DeclineAcknowledged => "No problem, nothing was submitted.".to_string(),
        Prompt::PendingOrderExists => {
            "You already have an order waiting for the operator. One at a time, please.".to_string()
        },
        Prompt::InvalidInput => "Sorry, I did not understand that.".to_string(),
    }
}

pub fn render_operator_brief(brief: &OperatorBrief) -> String {
    let order = &brief.order;
    format!(
        "🧾 New order #{}\nFrom: {} (chat {})\n{} {} → {}\nRate: {} ₽\nWallet: {}\nVia: {} {}\nUser history: {} \
         orders, {} completed",
        order.id,
        brief.submitter_name,
        brief.submitter_chat,
        order.crypto_amount,
        order.asset,
        order.fiat_amount,
        order.rate,
        order.wallet_address,
        order.bank_name,
        order.account_number,
        brief.stats.total,
        brief.stats.completed,
    )
}

pub fn render_notice(notice: SubmitterNotice, order_id: i64) -> String {
    match notice {
        SubmitterNotice::OrderCompleted => {
            format!("Order #{order_id} is complete. The coins are on their way. Thank you!")
        },
        SubmitterNotice::OrderRejected => {
            format!("Order #{order_id} was declined. If you believe this is a mistake, contact support.")
        },
    }
}

pub fn render_stats(stats: &ExchangeStats) -> String {
    let by_status =
        stats.by_status.iter().map(|c| format!("  {}: {}", c.status, c.count)).collect::<Vec<_>>().join("\n");
    format!(
        "📊 Service statistics\nUsers: {}\nOrders: {}\n{by_status}\nTurnover: {}\nCommission rate: {}%\nEstimated \
         earnings: {}",
        stats.user_count, stats.total_orders, stats.turnover, stats.commission_rate, stats.estimated_earnings,
    )
}

pub fn render_service_closed(contact_handle: &str) -> String {
    format!("The service is closed right now. Try again later or contact {contact_handle}.")
}
