//! Notifications delivered as `player_notification` rows.

use homestead_logic::notify::{Notifier, NotifyError};
use spacetimedb::{ReducerContext, Table};

use crate::tables::{player_notification, PlayerNotification};

pub struct TableNotifier<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> TableNotifier<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }
}

impl Notifier for TableNotifier<'_> {
    fn send(&mut self, external_id: &str, text: &str) -> Result<(), NotifyError> {
        self.ctx.db.player_notification().insert(PlayerNotification {
            id: 0,
            external_id: external_id.to_string(),
            text: text.to_string(),
            sent_at: self.ctx.timestamp,
        });
        Ok(())
    }
}
