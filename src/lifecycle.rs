use rust_fsm::*;
use serde::Serialize;

state_machine! {
    item_lifecycle(Active)

    Active(HydrateTrashed) => Trashed,

    Active(SoftDelete) => Trashed,
    Active(Restore) => Active,
    Active(Purge) => Purged,

    Trashed(SoftDelete) => Trashed,
    Trashed(Restore) => Active,
    Trashed(Purge) => Purged
}

/// Where a task or goal sits in the soft-delete lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Trashed,
    Purged,
}

impl LifecycleState {
    pub fn from_deleted(deleted: bool) -> Self {
        if deleted {
            Self::Trashed
        } else {
            Self::Active
        }
    }

    /// The stored `deleted` flag for this state. Purged rows have none.
    pub fn deleted_flag(self) -> Option<bool> {
        match self {
            Self::Active => Some(false),
            Self::Trashed => Some(true),
            Self::Purged => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    SoftDelete,
    Restore,
    Purge,
}

impl LifecycleAction {
    pub fn from_deleted_flag(deleted: bool) -> Self {
        if deleted {
            Self::SoftDelete
        } else {
            Self::Restore
        }
    }
}

fn hydrate(machine: &mut item_lifecycle::StateMachine, state: LifecycleState) -> Result<(), ()> {
    match state {
        LifecycleState::Active => Ok(()),
        LifecycleState::Trashed => machine
            .consume(&item_lifecycle::Input::HydrateTrashed)
            .map(|_| ())
            .map_err(|_| ()),
        LifecycleState::Purged => Err(()),
    }
}

/// Returns the next state, or `None` when the action is not allowed from
/// `current`. Nothing leaves `Purged`.
pub fn transition(current: LifecycleState, action: LifecycleAction) -> Option<LifecycleState> {
    let mut machine = item_lifecycle::StateMachine::new();
    hydrate(&mut machine, current).ok()?;

    let input = match action {
        LifecycleAction::SoftDelete => item_lifecycle::Input::SoftDelete,
        LifecycleAction::Restore => item_lifecycle::Input::Restore,
        LifecycleAction::Purge => item_lifecycle::Input::Purge,
    };
    machine.consume(&input).ok()?;

    let next = match machine.state() {
        item_lifecycle::State::Active => LifecycleState::Active,
        item_lifecycle::State::Trashed => LifecycleState::Trashed,
        item_lifecycle::State::Purged => LifecycleState::Purged,
    };
    Some(next)
}
