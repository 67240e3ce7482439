use async_trait::async_trait;
use teloxide::prelude::*;

use crate::delivery::Messenger;
use crate::profile::UserId;

/// Delivers stories over Telegram. The user id doubles as the chat id.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn create(token: String) -> Self {
        let bot = Bot::new(token);

        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
        self.bot.send_message(ChatId(user_id), text).await?;
        Ok(())
    }
}
