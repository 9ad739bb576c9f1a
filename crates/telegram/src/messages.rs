use paygate_core::{DecisionOutcome, Identity, Profile, Verdict};
use serde::Serialize;

use crate::actions::CallbackAction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum TextPart {
    Plain(String),
    Bold(String),
    /// Inline fixed-width span.
    Code(String),
    /// Fixed-width block, rendered so it can be copied verbatim.
    Preformatted(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ButtonTarget {
    Callback(String),
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
}

impl Button {
    pub fn callback(label: impl Into<String>, action: &CallbackAction) -> Self {
        Self { label: label.into(), target: ButtonTarget::Callback(action.encode()) }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self { label: label.into(), target: ButtonTarget::Url(url.into()) }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub parts: Vec<TextPart>,
    pub keyboard: Vec<Vec<Button>>,
}

impl MessageTemplate {
    /// Text with all formatting stripped, as a client without rich rendering would show it.
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                TextPart::Plain(text)
                | TextPart::Bold(text)
                | TextPart::Code(text)
                | TextPart::Preformatted(text) => text.as_str(),
            })
            .collect()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.keyboard.iter().flatten()
    }

    pub fn preformatted_blocks(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                TextPart::Preformatted(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

pub struct MessageBuilder {
    parts: Vec<TextPart>,
    keyboard: Vec<Vec<Button>>,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { parts: vec![TextPart::Plain(text.into())], keyboard: Vec::new() }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(TextPart::Plain(text.into()));
        self
    }

    pub fn bold(mut self, text: impl Into<String>) -> Self {
        self.parts.push(TextPart::Bold(text.into()));
        self
    }

    pub fn code(mut self, text: impl Into<String>) -> Self {
        self.parts.push(TextPart::Code(text.into()));
        self
    }

    pub fn preformatted(mut self, text: impl Into<String>) -> Self {
        self.parts.push(TextPart::Preformatted(text.into()));
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.keyboard.push(builder.buttons);
        }
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { parts: self.parts, keyboard: self.keyboard }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<Button>,
}

impl RowBuilder {
    pub fn button(&mut self, button: Button) -> &mut Self {
        self.buttons.push(button);
        self
    }
}

pub const SAMPLE_INPUT: &str = "6486714430 Got Invited By Your Url: +3 Rs\n\
7944746107 Got Invited By Your Url: +3 Rs\n\
7891172965 Got Invited By Your Url: +3 Rs";

pub const SAMPLE_OUTPUT: &str = "6486714430 2.1\n7944746107 2.1\n7891172965 2.1";

pub fn direct_message_url(target: Identity) -> String {
    format!("tg://openmessage?user_id={target}")
}

fn payment_format_button(label: &str) -> Button {
    Button::callback(label, &CallbackAction::PaymentFormat)
}

pub fn admin_menu() -> MessageTemplate {
    MessageBuilder::new("👑 Welcome Admin!\n\nChoose an option:")
        .row(|row| {
            row.button(payment_format_button("📄 Payment Format"));
        })
        .row(|row| {
            row.button(Button::callback("📨 Message User by ID", &CallbackAction::MessageUser));
        })
        .build()
}

pub fn payment_format_prompt() -> MessageTemplate {
    MessageBuilder::new("👋 Welcome to the bot!\n\nClick the button below to format user IDs:")
        .row(|row| {
            row.button(payment_format_button("📄 Payment Format"));
        })
        .build()
}

pub fn access_requested() -> MessageTemplate {
    MessageBuilder::new(
        "✅ Your request has been sent to the admin for approval.\n\
         Please wait while your request is being reviewed.",
    )
    .build()
}

pub fn approval_request(identity: Identity, profile: &Profile) -> MessageTemplate {
    MessageBuilder::new(format!(
        "🔔 New User Request:\n\n🆔 User ID: {identity}\n👤 Username: {}\n📛 Name: {}\n\nStatus: ⏳ Pending",
        profile.handle_label(),
        profile.display_name()
    ))
    .row(|row| {
        row.button(Button::callback(
            "✅ Approve",
            &CallbackAction::Decision { identity, verdict: Verdict::Approve },
        ))
        .button(Button::callback(
            "❌ Reject",
            &CallbackAction::Decision { identity, verdict: Verdict::Reject },
        ));
    })
    .build()
}

pub fn decision_summary(outcome: &DecisionOutcome) -> MessageTemplate {
    let header = match outcome.verdict {
        Verdict::Approve => "✅ User Approved:\n\n",
        Verdict::Reject => "❌ User Rejected:\n\n",
    };
    let mut builder = MessageBuilder::new(header).preformatted(format!(
        "User ID: {}\nUsername: {}\nName: {}",
        outcome.identity,
        outcome.profile.handle_label(),
        outcome.profile.display_name()
    ));
    if !outcome.applied {
        builder = builder.text("\n\nℹ️ Already decided earlier; the user was not notified again.");
    }
    builder.build()
}

pub fn approval_notice() -> MessageTemplate {
    MessageBuilder::new(
        "🎉 Your request has been approved!\n\nYou can now use the bot. Use /start to begin.",
    )
    .build()
}

pub fn rejection_notice(owner_handle: &str) -> MessageTemplate {
    MessageBuilder::new(format!(
        "❌ Your request has been rejected.\n\nYou aren't allowed to use this bot.\nAny queries? DM {owner_handle}"
    ))
    .build()
}

pub fn admin_only() -> MessageTemplate {
    MessageBuilder::new("❌ This feature is for admin only!").build()
}

pub fn format_instructions() -> MessageTemplate {
    MessageBuilder::new(
        "📝 Send me the user IDs in any format.\n\nI will extract all user IDs and format them.\n\nExample input:\n",
    )
    .preformatted(SAMPLE_INPUT)
    .text(
        "\n\nFirst I'll show you extracted IDs, then ask for amount.\nFinally, I'll give you formatted output:\n",
    )
    .preformatted(SAMPLE_OUTPUT)
    .text("\n\nPlease send your IDs now:")
    .build()
}

pub fn no_identifiers_found() -> MessageTemplate {
    MessageBuilder::new(
        "❌ No user IDs found in your message.\n\nPlease make sure you're sending user IDs in the format:\n",
    )
    .preformatted(
        "6486714430 Got Invited By Your Url: +3 Rs\n7944746107 Got Invited By Your Url: +3 Rs",
    )
    .text("\n\nOr simply send numbers like:\n")
    .preformatted("6486714430\n7944746107\n7891172965")
    .text("\n\nPlease send IDs again:")
    .build()
}

pub fn identifiers_found(identifiers: &[String]) -> MessageTemplate {
    MessageBuilder::new(format!("✅ Found {} unique user ID(s):\n\n", identifiers.len()))
        .preformatted(identifiers.join("\n"))
        .text("\n\nNow enter the amount to add (e.g., 2.1, 5, 10.5):")
        .build()
}

pub fn amount_required() -> MessageTemplate {
    MessageBuilder::new("❌ Please enter a valid amount (e.g., 2.1, 5, 10.5):").build()
}

pub fn restart_required() -> MessageTemplate {
    MessageBuilder::new("❌ No user IDs found. Please start over with /start").build()
}

pub fn formatted_output(output: &str) -> MessageTemplate {
    MessageBuilder::new("✅ Here's your formatted output:\n\n")
        .preformatted(output)
        .text("\n\n📋 ")
        .bold("Easy to copy:")
        .text(" Just tap and hold on the text above, then select 'Copy'")
        .build()
}

pub fn format_more() -> MessageTemplate {
    MessageBuilder::new("Click below to format more IDs:")
        .row(|row| {
            row.button(payment_format_button("📄 Format More IDs"));
        })
        .build()
}

pub fn target_identity_prompt() -> MessageTemplate {
    MessageBuilder::new("📨 Send me the User ID you want to message:\n\nExample: ")
        .code("1234567890")
        .build()
}

pub fn invalid_target_identity() -> MessageTemplate {
    MessageBuilder::new(
        "❌ Invalid User ID. Please send a valid numeric User ID (e.g., 1234567890):",
    )
    .build()
}

pub fn direct_message_link(target: Identity) -> MessageTemplate {
    MessageBuilder::new("✅ User ID: ")
        .code(target.to_string())
        .text("\n\nClick the button below to message this user directly:")
        .row(|row| {
            row.button(Button::url(format!("📨 Message User {target}"), direct_message_url(target)));
        })
        .build()
}

pub fn cancelled() -> MessageTemplate {
    MessageBuilder::new("❌ Operation cancelled.\nUse /start to begin again.").build()
}

pub fn help_message(is_admin: bool, owner_handle: &str) -> MessageTemplate {
    let builder = MessageBuilder::new("🤖 Bot Commands:\n\n");
    let builder = if is_admin {
        builder
            .text("👑 ")
            .bold("Admin Commands:")
            .text(
                "\n/start - Show admin menu\n/help - Show this help message\n/cancel - Cancel current operation\n\n📋 ",
            )
            .bold("Admin Features:")
            .text(
                "\n1. Approve/Reject user requests\n2. Format payment IDs\n3. Message users by ID\n\n",
            )
    } else {
        builder.text(
            "/start - Start the bot and request approval\n/help - Show this help message\n/cancel - Cancel current operation\n\n",
        )
    };
    builder.text(format!("For any queries, DM {owner_handle}")).build()
}

pub fn error_message(user_message: &str) -> MessageTemplate {
    MessageBuilder::new(user_message).build()
}

#[cfg(test)]
mod tests {
    use paygate_core::{DecisionOutcome, Identity, Profile, Verdict};

    use super::{
        admin_menu, approval_request, decision_summary, direct_message_link, formatted_output,
        help_message, identifiers_found, ButtonTarget, TextPart,
    };

    #[test]
    fn admin_menu_offers_both_features_on_separate_rows() {
        let message = admin_menu();

        assert_eq!(message.keyboard.len(), 2);
        let targets = message.buttons().map(|button| button.target.clone()).collect::<Vec<_>>();
        assert_eq!(targets, vec![
            ButtonTarget::Callback("payment_format".to_owned()),
            ButtonTarget::Callback("message_user".to_owned()),
        ]);
    }

    #[test]
    fn approval_request_tags_buttons_with_identity() {
        let profile = Profile::new("Ada").with_last_name("Lovelace").with_handle("ada");
        let message = approval_request(Identity(6_486_714_430), &profile);

        assert!(message.plain_text().contains("🆔 User ID: 6486714430"));
        assert!(message.plain_text().contains("👤 Username: @ada"));
        assert!(message.plain_text().contains("📛 Name: Ada Lovelace"));
        let targets = message.buttons().map(|button| button.target.clone()).collect::<Vec<_>>();
        assert_eq!(targets, vec![
            ButtonTarget::Callback("approve_6486714430".to_owned()),
            ButtonTarget::Callback("reject_6486714430".to_owned()),
        ]);
    }

    #[test]
    fn decision_summary_renders_profile_block() {
        let outcome = DecisionOutcome {
            identity: Identity(12_345),
            verdict: Verdict::Reject,
            profile: Profile::default(),
            had_pending: false,
            applied: true,
        };

        let message = decision_summary(&outcome);

        assert!(message.plain_text().starts_with("❌ User Rejected:"));
        assert_eq!(message.preformatted_blocks(), vec![
            "User ID: 12345\nUsername: No username\nName: "
        ]);
    }

    #[test]
    fn identifiers_are_echoed_one_per_line_in_a_block() {
        let message = identifiers_found(&["111".to_owned(), "222".to_owned()]);

        assert!(message.plain_text().contains("Found 2 unique user ID(s)"));
        assert_eq!(message.preformatted_blocks(), vec!["111\n222"]);
    }

    #[test]
    fn formatted_output_is_a_copyable_block() {
        let message = formatted_output("111 5\n222 5");

        assert_eq!(message.preformatted_blocks(), vec!["111 5\n222 5"]);
        assert!(message.parts.contains(&TextPart::Bold("Easy to copy:".to_owned())));
    }

    #[test]
    fn direct_message_link_points_at_identity() {
        let message = direct_message_link(Identity(1_234_567_890));

        let button = message.buttons().next().expect("link button");
        assert_eq!(
            button.target,
            ButtonTarget::Url("tg://openmessage?user_id=1234567890".to_owned())
        );
    }

    #[test]
    fn help_mentions_owner_and_admin_features_only_for_admin() {
        let admin = help_message(true, "@owner").plain_text();
        let member = help_message(false, "@owner").plain_text();

        assert!(admin.contains("Admin Features:"));
        assert!(!member.contains("Admin Features:"));
        assert!(member.ends_with("For any queries, DM @owner"));
    }
}
