use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockGroup {
    Pointing,
    Focus,
}

impl LockGroup {
    pub const ALL: [LockGroup; 2] = [LockGroup::Pointing, LockGroup::Focus];
}

/// Whether pointing and focus commands may run at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockLayout {
    /// Independent pointing and focus groups.
    #[default]
    Split,
    /// One mutex shared by both groups.
    Unified,
}

/// Held group lock; released when dropped.
#[derive(Debug)]
pub struct GroupGuard {
    group: LockGroup,
    _guard: OwnedMutexGuard<()>,
}

impl GroupGuard {
    pub fn group(&self) -> LockGroup {
        self.group
    }
}

/// Mutual exclusion domains serialising conflicting commands.
pub struct LockArbiter {
    pointing: Arc<Mutex<()>>,
    focus: Arc<Mutex<()>>,
}

impl LockArbiter {
    pub fn new(layout: LockLayout) -> Self {
        let pointing = Arc::new(Mutex::new(()));
        let focus = match layout {
            LockLayout::Split => Arc::new(Mutex::new(())),
            LockLayout::Unified => pointing.clone(),
        };

        Self { pointing, focus }
    }

    fn mutex(&self, group: LockGroup) -> &Arc<Mutex<()>> {
        match group {
            LockGroup::Pointing => &self.pointing,
            LockGroup::Focus => &self.focus,
        }
    }

    pub fn try_acquire(&self, group: LockGroup) -> Option<GroupGuard> {
        match self.mutex(group).clone().try_lock_owned() {
            Ok(guard) => Some(GroupGuard {
                group,
                _guard: guard,
            }),
            Err(_) => {
                debug!("Lock group {:?} is busy", group);
                None
            }
        }
    }

    pub async fn acquire(&self, group: LockGroup) -> GroupGuard {
        let guard = self.mutex(group).clone().lock_owned().await;
        GroupGuard {
            group,
            _guard: guard,
        }
    }

    /// Takes every listed group or none of them.
    ///
    /// Groups sharing a mutex under [`LockLayout::Unified`] are taken once.
    pub fn try_acquire_all(&self, groups: &[LockGroup]) -> Option<Vec<GroupGuard>> {
        let mut guards: Vec<GroupGuard> = Vec::with_capacity(groups.len());
        for &group in groups {
            let shared = guards
                .iter()
                .any(|held| Arc::ptr_eq(self.mutex(held.group), self.mutex(group)));
            if shared {
                continue;
            }
            // Dropping `guards` on the early return releases what was taken.
            guards.push(self.try_acquire(group)?);
        }
        Some(guards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_groups_are_independent() {
        let arbiter = LockArbiter::new(LockLayout::Split);
        let pointing = arbiter.try_acquire(LockGroup::Pointing).unwrap();
        assert!(arbiter.try_acquire(LockGroup::Pointing).is_none());
        assert!(arbiter.try_acquire(LockGroup::Focus).is_some());
        drop(pointing);
        assert!(arbiter.try_acquire(LockGroup::Pointing).is_some());
    }

    #[test]
    fn test_unified_groups_exclude_each_other() {
        let arbiter = LockArbiter::new(LockLayout::Unified);
        let _focus = arbiter.try_acquire(LockGroup::Focus).unwrap();
        assert!(arbiter.try_acquire(LockGroup::Pointing).is_none());
    }

    #[test]
    fn test_acquire_all_releases_on_failure() {
        let arbiter = LockArbiter::new(LockLayout::Split);
        let focus = arbiter.try_acquire(LockGroup::Focus).unwrap();
        assert!(arbiter.try_acquire_all(&LockGroup::ALL).is_none());
        assert!(arbiter.try_acquire(LockGroup::Pointing).is_some());

        drop(focus);
        let all = arbiter.try_acquire_all(&LockGroup::ALL).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_unified_acquire_all_takes_mutex_once() {
        let arbiter = LockArbiter::new(LockLayout::Unified);
        let all = arbiter.try_acquire_all(&LockGroup::ALL).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].group(), LockGroup::Pointing);
    }

    #[tokio::test]
    async fn test_blocking_acquire_waits_for_release() {
        let arbiter = Arc::new(LockArbiter::new(LockLayout::Split));
        let held = arbiter.try_acquire(LockGroup::Pointing).unwrap();

        let waiter = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move { arbiter.acquire(LockGroup::Pointing).await.group() })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(held);
        assert_eq!(waiter.await.unwrap(), LockGroup::Pointing);
    }
}
