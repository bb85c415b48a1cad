//! Hard-coded field groups for the specialized connector and action editors.
//!
//! These predate server-supplied metadata. They still serve as the catalogue
//! when the backend does not publish field groups, and they use the same
//! [`ConfigListEditor`] as the metadata path.

use super::{ConfigListEditor, ItemKind};
use crate::forms::{FieldDefinition, FieldGroup, FieldOption};

fn group(name: &str, label: &str, fields: Vec<FieldDefinition>) -> FieldGroup {
    FieldGroup {
        name: name.to_string(),
        label: label.to_string(),
        fields,
    }
}

fn github_repo_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::password("token", "GitHub Token")
            .required()
            .with_help("Personal access token with repository access"),
        FieldDefinition::text("owner", "Repository Owner")
            .required()
            .with_placeholder("username or organization"),
        FieldDefinition::text("repository", "Repository Name")
            .required()
            .with_placeholder("repository"),
    ]
}

fn github_polling_fields() -> Vec<FieldDefinition> {
    let mut fields = github_repo_fields();
    fields.push(
        FieldDefinition::select(
            "replyIfNoReplies",
            "Reply Behavior",
            vec![
                FieldOption::new("false", "Reply to all issues"),
                FieldOption::new("true", "Only reply to issues with no comments"),
            ],
        )
        .with_default("false"),
    );
    fields.push(
        FieldDefinition::text("pollInterval", "Poll Interval")
            .with_default("10m")
            .with_help("How often to check for new items (e.g. 5m, 1h)"),
    );
    fields
}

fn custom_action_name() -> FieldDefinition {
    FieldDefinition::text("customActionName", "Custom Action Name (Optional)")
        .with_help("Overrides the name the agent sees for this action")
}

/// Connector groups of the specialized editors.
pub fn connector_groups() -> Vec<FieldGroup> {
    vec![
        group(
            "telegram",
            "Telegram",
            vec![FieldDefinition::text("token", "Telegram Bot Token")
                .required()
                .with_placeholder("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")
                .with_help("Get this from @BotFather on Telegram")],
        ),
        group(
            "slack",
            "Slack",
            vec![
                FieldDefinition::password("appToken", "Slack App Token")
                    .required()
                    .with_placeholder("xapp-..."),
                FieldDefinition::password("botToken", "Slack Bot Token")
                    .required()
                    .with_placeholder("xoxb-..."),
                FieldDefinition::text("channelID", "Slack Channel ID"),
                FieldDefinition::checkbox("alwaysReply", "Always Reply"),
            ],
        ),
        group(
            "discord",
            "Discord",
            vec![
                FieldDefinition::password("token", "Discord Bot Token").required(),
                FieldDefinition::text("defaultChannel", "Default Channel"),
            ],
        ),
        group("github-issues", "GitHub Issues", github_polling_fields()),
        group("github-prs", "GitHub Pull Requests", github_polling_fields()),
        group(
            "irc",
            "IRC",
            vec![
                FieldDefinition::text("server", "IRC Server")
                    .required()
                    .with_placeholder("irc.libera.chat"),
                FieldDefinition::text("port", "Port").with_default("6667"),
                FieldDefinition::text("nickname", "Nickname").required(),
                FieldDefinition::text("channel", "Channel").with_placeholder("#channel"),
                FieldDefinition::checkbox("alwaysReply", "Always Reply"),
            ],
        ),
        group(
            "twitter",
            "Twitter",
            vec![
                FieldDefinition::password("apiKey", "API Key"),
                FieldDefinition::password("apiSecret", "API Secret"),
                FieldDefinition::password("accessToken", "Access Token"),
                FieldDefinition::password("accessSecret", "Access Token Secret"),
                FieldDefinition::password("bearerToken", "Bearer Token"),
            ],
        ),
    ]
}

/// Action groups of the specialized editors.
pub fn action_groups() -> Vec<FieldGroup> {
    let mut labeler = github_repo_fields();
    labeler.push(
        FieldDefinition::text("availableLabels", "Available Labels")
            .with_default("bug,enhancement")
            .with_help("Comma separated list of labels the agent may apply"),
    );
    labeler.push(custom_action_name());

    let with_custom_name = || {
        let mut fields = github_repo_fields();
        fields.push(custom_action_name());
        fields
    };

    vec![
        group(
            "send-mail",
            "Send Email",
            vec![
                FieldDefinition::new("email", "Email", crate::forms::FieldKind::Email).required(),
                FieldDefinition::text("username", "Username"),
                FieldDefinition::password("password", "Password"),
                FieldDefinition::text("smtpHost", "SMTP Host").required(),
                FieldDefinition::text("smtpPort", "SMTP Port").with_default("587"),
            ],
        ),
        group("github-issue-labeler", "GitHub Issue Labeler", labeler),
        group("github-issue-opener", "GitHub Issue Opener", with_custom_name()),
        group(
            "github-issue-commenter",
            "GitHub Issue Commenter",
            with_custom_name(),
        ),
        group(
            "github-repository-get-content",
            "GitHub Repository Content",
            with_custom_name(),
        ),
        group(
            "generate_image",
            "Generate Image",
            vec![
                FieldDefinition::password("apiKey", "API Key"),
                FieldDefinition::text("apiURL", "API URL")
                    .with_placeholder("http://localhost:8080"),
                FieldDefinition::text("model", "Model").with_default("dall-e-3"),
            ],
        ),
        group(
            "twitter-post",
            "Post on Twitter",
            vec![
                FieldDefinition::password("token", "Twitter API Token").required(),
                FieldDefinition::checkbox("noCharacterLimits", "Disable character limit"),
            ],
        ),
    ]
}

impl ConfigListEditor {
    /// Connector editor backed by the hard-coded groups.
    pub fn legacy_connectors() -> Self {
        Self::new(ItemKind::Connector, connector_groups())
    }

    /// Action editor backed by the hard-coded groups.
    pub fn legacy_actions() -> Self {
        Self::new(ItemKind::Action, action_groups())
    }
}
