use fedlink_common::FederatedMessage;

/// Emoji shown for messages from platforms we don't recognize.
pub const DEFAULT_PLATFORM_EMOJI: &str = "🌐";

/// Static platform → emoji lookup for outbound chat formatting.
pub fn platform_emoji(platform: &str) -> &'static str {
    match platform {
        "telegram" => "✈️",
        "web" => "💻",
        "discord" => "🎮",
        "slack" => "💼",
        "matrix" => "🔷",
        "irc" => "📟",
        _ => DEFAULT_PLATFORM_EMOJI,
    }
}

/// `<platform-emoji> <displayName>: <text>` — how federated messages appear
/// in the external chat.
pub fn format_for_chat(message: &FederatedMessage) -> String {
    format!(
        "{} {}: {}",
        platform_emoji(&message.from.platform),
        message.from.display_name,
        message.text
    )
}

#[cfg(test)]
mod tests {
    use fedlink_common::FederatedSender;

    use super::*;

    fn message(platform: &str) -> FederatedMessage {
        FederatedMessage {
            id: "m1".into(),
            text: "hello-from-other".into(),
            from: FederatedSender {
                user_id: "u1".into(),
                display_name: "Alice".into(),
                platform: platform.into(),
            },
            sent_at: 0,
            room_id: "r1".into(),
        }
    }

    #[test]
    fn known_platform_gets_its_emoji() {
        assert_eq!(
            format_for_chat(&message("web")),
            "💻 Alice: hello-from-other"
        );
    }

    #[test]
    fn unknown_platform_falls_back_to_default() {
        assert_eq!(platform_emoji("smoke-signals"), DEFAULT_PLATFORM_EMOJI);
        assert_eq!(
            format_for_chat(&message("smoke-signals")),
            "🌐 Alice: hello-from-other"
        );
    }
}
