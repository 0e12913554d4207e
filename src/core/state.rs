use std::sync::Arc;

use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::time::Clock;
use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, clock, notifier }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.inner.notifier.as_ref()
    }

    pub(crate) fn now(&self) -> PrimitiveDateTime {
        self.inner.clock.now()
    }
}
