//! Exactly-once anchor freeze.
//!
//! # Responsibility
//! - Watch each new AR entity for its first projection update.
//! - On that update: capture the position, detach the entity from the
//!   projector, write the position back, apply the per-kind vertical offset
//!   and drop the subscription.
//! - Resubscribe bindings whose first update never arrives, and report them
//!   as lost once the retry budget is spent.
//!
//! # Invariants
//! - `AnchorBinding::fixed_local_position` is written at most once.
//! - A frozen binding never holds a subscription and is never resubscribed.
//! - This controller writes only AR entity transforms, never map state.

use crate::config::{FreezePolicy, OffsetMode};
use crate::model::object::{ObjectId, ObjectKind};
use crate::scene::views::{ArScene, EntityHandle, LocalPosition, SubscriptionHandle};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

/// Runtime freeze state of one placed object.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorBinding {
    object_id: ObjectId,
    kind: ObjectKind,
    entity: EntityHandle,
    fixed_local_position: Option<LocalPosition>,
    subscription: Option<SubscriptionHandle>,
    /// First `tick` time observed while waiting; reset on resubscribe.
    waiting_since_ms: Option<i64>,
    resubscribe_attempts: u32,
    lost: bool,
}

impl AnchorBinding {
    fn new(object_id: ObjectId, kind: ObjectKind, entity: EntityHandle) -> Self {
        Self {
            object_id,
            kind,
            entity,
            fixed_local_position: None,
            subscription: None,
            waiting_since_ms: None,
            resubscribe_attempts: 0,
            lost: false,
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    pub fn is_frozen(&self) -> bool {
        self.fixed_local_position.is_some()
    }

    pub fn fixed_local_position(&self) -> Option<LocalPosition> {
        self.fixed_local_position
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn resubscribe_attempts(&self) -> u32 {
        self.resubscribe_attempts
    }

    /// Whether the retry budget ran out before the first update.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Write-once setter; returns `false` if a position was already fixed.
    fn fix(&mut self, position: LocalPosition) -> bool {
        if self.fixed_local_position.is_some() {
            return false;
        }
        self.fixed_local_position = Some(position);
        self.waiting_since_ms = None;
        self.lost = false;
        true
    }
}

/// Result of binding a freshly presented entity.
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// Waiting for the first projection update.
    Subscribed,
    /// The projector had already positioned the entity; frozen on the spot.
    FrozenImmediately(LocalPosition),
    /// The entity is not in the scene, so no update could ever be observed.
    /// The binding is still recorded and surfaces through `tick` as lost.
    EntityNotLive,
    /// The scene refused the subscription; `tick` will retry.
    SubscriptionRefused,
    AlreadyBound,
}

/// Result of handling one projection update.
#[derive(Debug, Clone, PartialEq)]
pub enum FreezeOutcome {
    Frozen {
        object_id: ObjectId,
        position: LocalPosition,
    },
    AlreadyFrozen,
    /// No binding for this entity (released, or never bound).
    UnknownEntity,
    /// The scene had no position to capture yet; still waiting.
    PositionUnavailable,
}

/// Owns every `AnchorBinding` of a session.
#[derive(Debug, Clone)]
pub struct AnchorFreezeController {
    policy: FreezePolicy,
    bindings: BTreeMap<ObjectId, AnchorBinding>,
    by_entity: HashMap<EntityHandle, ObjectId>,
}

impl AnchorFreezeController {
    pub fn new(policy: FreezePolicy) -> Self {
        Self {
            policy,
            bindings: BTreeMap::new(),
            by_entity: HashMap::new(),
        }
    }

    /// Starts watching `entity` for its first projection update.
    ///
    /// Must run before control returns to the host event loop after the
    /// entity was spawned. If the projector positioned the entity before the
    /// subscription existed, the freeze happens here instead of waiting for
    /// an update that already went by.
    pub fn bind(
        &mut self,
        object_id: ObjectId,
        kind: ObjectKind,
        entity: EntityHandle,
        scene: &mut dyn ArScene,
    ) -> BindOutcome {
        if self.bindings.contains_key(&object_id) {
            return BindOutcome::AlreadyBound;
        }
        let mut binding = AnchorBinding::new(object_id.clone(), kind, entity);
        if !scene.is_live(entity) {
            // Kept without a subscription so `tick` reports it as lost.
            warn!(
                "event=anchor_bind module=freeze status=error object_id={object_id} error_code=entity_not_live"
            );
            self.by_entity.insert(entity, object_id.clone());
            self.bindings.insert(object_id, binding);
            return BindOutcome::EntityNotLive;
        }

        binding.subscription = scene.subscribe_projection(entity);
        let subscribed = binding.is_subscribed();
        self.by_entity.insert(entity, object_id.clone());
        self.bindings.insert(object_id.clone(), binding);

        if scene.has_projected(entity) {
            if let FreezeOutcome::Frozen { position, .. } = self.freeze(&object_id, scene) {
                return BindOutcome::FrozenImmediately(position);
            }
        }

        if subscribed {
            debug!("event=anchor_bind module=freeze status=ok object_id={object_id}");
            BindOutcome::Subscribed
        } else {
            warn!(
                "event=anchor_bind module=freeze status=error object_id={object_id} error_code=subscription_refused"
            );
            BindOutcome::SubscriptionRefused
        }
    }

    /// Handles a projection update for `entity`.
    pub fn on_projection_updated(
        &mut self,
        entity: EntityHandle,
        scene: &mut dyn ArScene,
    ) -> FreezeOutcome {
        let Some(object_id) = self.by_entity.get(&entity).cloned() else {
            return FreezeOutcome::UnknownEntity;
        };
        self.freeze(&object_id, scene)
    }

    fn freeze(&mut self, object_id: &ObjectId, scene: &mut dyn ArScene) -> FreezeOutcome {
        let policy = self.policy;
        let Some(binding) = self.bindings.get_mut(object_id) else {
            return FreezeOutcome::UnknownEntity;
        };
        if binding.is_frozen() {
            return FreezeOutcome::AlreadyFrozen;
        }
        let Some(captured) = scene.local_position(binding.entity) else {
            return FreezeOutcome::PositionUnavailable;
        };

        scene.detach_projection(binding.entity);
        // Detaching may nudge the transform; restore the captured value first.
        scene.set_local_position(binding.entity, captured);

        let offset = policy.offsets.for_kind(binding.kind);
        let y = match policy.offset_mode {
            OffsetMode::Replace => offset,
            OffsetMode::Additive => captured.y + offset,
        };
        let fixed = LocalPosition::new(captured.x, y, captured.z);
        scene.set_local_position(binding.entity, fixed);

        if let Some(subscription) = binding.subscription.take() {
            scene.unsubscribe_projection(subscription);
        }
        binding.fix(fixed);

        info!(
            "event=anchor_freeze module=freeze status=ok object_id={object_id} kind={} x={:.3} y={:.3} z={:.3}",
            binding.kind.as_str(),
            fixed.x,
            fixed.y,
            fixed.z
        );
        FreezeOutcome::Frozen {
            object_id: object_id.clone(),
            position: fixed,
        }
    }

    /// Advances the retry clock.
    ///
    /// Each unfrozen binding starts its timeout at the first tick that sees
    /// it. After `projection_timeout_ms` without an update it is
    /// resubscribed; once `max_resubscribe_attempts` are spent it is marked
    /// lost and returned (once) so the caller can report it.
    pub fn tick(&mut self, now_ms: i64, scene: &mut dyn ArScene) -> Vec<ObjectId> {
        let policy = self.policy;
        let mut newly_lost = Vec::new();

        for binding in self.bindings.values_mut() {
            if binding.is_frozen() || binding.lost {
                continue;
            }
            let since = *binding.waiting_since_ms.get_or_insert(now_ms);
            if now_ms - since < policy.projection_timeout_ms {
                continue;
            }

            if let Some(subscription) = binding.subscription.take() {
                scene.unsubscribe_projection(subscription);
            }

            if binding.resubscribe_attempts >= policy.max_resubscribe_attempts
                || !scene.is_live(binding.entity)
            {
                binding.lost = true;
                warn!(
                    "event=anchor_projection_lost module=freeze status=error object_id={} attempts={}",
                    binding.object_id, binding.resubscribe_attempts
                );
                newly_lost.push(binding.object_id.clone());
                continue;
            }

            binding.resubscribe_attempts += 1;
            binding.subscription = scene.subscribe_projection(binding.entity);
            binding.waiting_since_ms = Some(now_ms);
            info!(
                "event=anchor_resubscribe module=freeze status={} object_id={} attempt={}",
                if binding.is_subscribed() { "ok" } else { "refused" },
                binding.object_id,
                binding.resubscribe_attempts
            );
        }

        newly_lost
    }

    /// Gives a lost binding a fresh retry budget.
    ///
    /// Returns `false` when the entity is no longer live; the caller has to
    /// spawn a new one and `bind` it again.
    pub fn retry(&mut self, object_id: &ObjectId, scene: &mut dyn ArScene) -> bool {
        let Some(binding) = self.bindings.get_mut(object_id) else {
            return false;
        };
        if binding.is_frozen() || !binding.lost || !scene.is_live(binding.entity) {
            return false;
        }
        binding.lost = false;
        binding.resubscribe_attempts = 0;
        binding.waiting_since_ms = None;
        binding.subscription = scene.subscribe_projection(binding.entity);
        binding.is_subscribed()
    }

    /// Discards the binding of `object_id`, dropping any live subscription.
    pub fn release(
        &mut self,
        object_id: &ObjectId,
        scene: &mut dyn ArScene,
    ) -> Option<AnchorBinding> {
        let mut binding = self.bindings.remove(object_id)?;
        self.by_entity.remove(&binding.entity);
        if let Some(subscription) = binding.subscription.take() {
            scene.unsubscribe_projection(subscription);
        }
        Some(binding)
    }

    pub fn binding(&self, object_id: &ObjectId) -> Option<&AnchorBinding> {
        self.bindings.get(object_id)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &AnchorBinding> {
        self.bindings.values()
    }

    /// Number of bindings still waiting for their first update.
    pub fn pending_count(&self) -> usize {
        self.bindings
            .values()
            .filter(|binding| !binding.is_frozen())
            .count()
    }

    pub fn policy(&self) -> &FreezePolicy {
        &self.policy
    }
}
