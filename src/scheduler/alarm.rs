// src/scheduler/alarm.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::Result;
use crate::store::PlannedTaskStore;
use crate::support::Clock;
use crate::tasks::{PlannedTask, RunnableTask};
use crate::types::{BoxFuture, PlanningType, SchedulerType};

use super::{TimeBasedScheduler, WakeAlarm};

/// [`TimeBasedScheduler`] keeping a single alarm armed for the earliest
/// scheduled task.
pub struct AlarmScheduler {
    store: Arc<dyn PlannedTaskStore>,
    alarm: Arc<dyn WakeAlarm>,
    clock: Arc<dyn Clock>,
    min_alarm_interval_ms: i64,
}

impl fmt::Debug for AlarmScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmScheduler")
            .field("alarm_up", &self.alarm.is_up())
            .field("min_alarm_interval_ms", &self.min_alarm_interval_ms)
            .finish_non_exhaustive()
    }
}

impl AlarmScheduler {
    pub fn new(
        store: Arc<dyn PlannedTaskStore>,
        alarm: Arc<dyn WakeAlarm>,
        clock: Arc<dyn Clock>,
        min_alarm_interval_ms: i64,
    ) -> Self {
        Self {
            store,
            alarm,
            clock,
            min_alarm_interval_ms,
        }
    }

    /// Re-arm the alarm after a restart if scheduled work exists but
    /// nothing is armed.
    pub async fn setup(&self) -> Result<()> {
        if self.alarm.is_up() {
            return Ok(());
        }
        let tasks = self
            .store
            .get_all_sorted_by_next_run(Some(PlanningType::Scheduled))
            .await?;
        if let Some(head) = tasks.first() {
            info!("alarm was not up; scheduling");
            self.alarm.set(self.alarm_interval(head));
        }
        Ok(())
    }

    fn alarm_interval(&self, task: &PlannedTask) -> i64 {
        task.next_run(self.clock.now_millis())
            .max(self.min_alarm_interval_ms)
    }

    async fn schedule_inner(&self, task: RunnableTask) -> Result<PlannedTask> {
        if let Some(existing) = self.store.get_equivalent(&task).await? {
            return Ok(existing);
        }

        let all = self
            .store
            .get_all_sorted_by_next_run(Some(PlanningType::Scheduled))
            .await?;
        let now = self.clock.now_millis();
        let planned = PlannedTask::new(
            PlanningType::Scheduled,
            SchedulerType::TimerBacked,
            task,
            now,
        );

        let becomes_head = all
            .first()
            .is_none_or(|head| head.next_run(now) > planned.next_run(now));
        if becomes_head {
            let interval = self.alarm_interval(&planned);
            debug!(planned_task = %planned.id, interval_ms = interval, "arming alarm");
            self.alarm.set(interval);
        }

        self.store.insert(planned.clone()).await?;
        info!(
            planned_task = %planned.id,
            task = %planned.name(),
            interval_s = planned.task.interval,
            recurrent = planned.task.recurrent,
            "task scheduled"
        );
        Ok(planned)
    }

    async fn cancel_inner(&self, id: &str) -> Result<()> {
        let Some(existing) = self.store.get(id).await? else {
            return Ok(());
        };

        let all = self
            .store
            .get_all_sorted_by_next_run(Some(PlanningType::Scheduled))
            .await?;
        let now = self.clock.now_millis();
        let own_next = existing.next_run(now);

        match all.as_slice() {
            [_] => {
                debug!("last scheduled task cancelled; disarming alarm");
                self.alarm.cancel();
            }
            [head, second, ..]
                if head.next_run(now) == own_next && second.next_run(now) != own_next =>
            {
                self.alarm.set(self.alarm_interval(second));
            }
            _ => {}
        }

        self.store.delete(id).await?;
        info!(planned_task = %id, "task cancelled");
        Ok(())
    }
}

impl TimeBasedScheduler for AlarmScheduler {
    fn schedule(&self, task: RunnableTask) -> BoxFuture<'_, Result<PlannedTask>> {
        Box::pin(self.schedule_inner(task))
    }

    fn cancel(&self, planned_task_id: &str) -> BoxFuture<'_, Result<()>> {
        let id = planned_task_id.to_string();
        Box::pin(async move { self.cancel_inner(&id).await })
    }
}
