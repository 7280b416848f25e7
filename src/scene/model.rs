//! Boundary model of the scene collaborator.
//!
//! The renderer only needs identity, hierarchy, per-object visibility and render-layer masks.
//! Geometry is kept to what the software engine can rasterize: axis-aligned quads in world units.

use crate::effects::effect::EffectChain;
use crate::foundation::core::{Rect, Rgba8Premul, SurfaceSize};
use crate::foundation::error::{HalationError, HalationResult};

/// Stable identity of a scene object.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ObjectId(pub u32);

/// Bit set of render layers (32 layers).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const DEFAULT: Self = Self(1);
    pub const ALL: Self = Self(u32::MAX);

    pub fn single(layer: u8) -> Self {
        Self(1u32 << (layer % 32))
    }

    pub fn enable(&mut self, layer: u8) {
        self.0 |= 1u32 << (layer % 32);
    }

    pub fn disable(&mut self, layer: u8) {
        self.0 &= !(1u32 << (layer % 32));
    }

    pub fn contains(self, layer: u8) -> bool {
        self.0 & (1u32 << (layer % 32)) != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What an object contributes when drawn.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Group,
    Mesh {
        rect: Rect,
        color: Rgba8Premul,
        /// Lit meshes are shaded by the lights visible to the camera; unlit ones ignore lights.
        lit: bool,
    },
    Light {
        intensity: f32,
    },
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub visible: bool,
    pub layers: LayerMask,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
}

impl SceneObject {
    pub fn is_light(&self) -> bool {
        matches!(self.kind, ObjectKind::Light { .. })
    }
}

/// Arena-backed scene graph. Ids are never reused.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: Vec<Option<SceneObject>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, parent: Option<ObjectId>, kind: ObjectKind) -> HalationResult<ObjectId> {
        let id = ObjectId(
            self.objects
                .len()
                .try_into()
                .map_err(|_| HalationError::validation("scene object id overflow"))?,
        );
        if let Some(p) = parent {
            self.get_mut(p)
                .ok_or_else(|| HalationError::validation(format!("unknown parent {p:?}")))?
                .children
                .push(id);
        }
        self.objects.push(Some(SceneObject {
            id,
            kind,
            visible: true,
            layers: LayerMask::DEFAULT,
            parent,
            children: Vec::new(),
        }));
        Ok(id)
    }

    pub fn add_group(&mut self, parent: Option<ObjectId>) -> HalationResult<ObjectId> {
        self.insert(parent, ObjectKind::Group)
    }

    pub fn add_mesh(
        &mut self,
        parent: Option<ObjectId>,
        rect: Rect,
        color: Rgba8Premul,
    ) -> HalationResult<ObjectId> {
        self.insert(
            parent,
            ObjectKind::Mesh {
                rect,
                color,
                lit: false,
            },
        )
    }

    pub fn add_lit_mesh(
        &mut self,
        parent: Option<ObjectId>,
        rect: Rect,
        color: Rgba8Premul,
    ) -> HalationResult<ObjectId> {
        self.insert(
            parent,
            ObjectKind::Mesh {
                rect,
                color,
                lit: true,
            },
        )
    }

    pub fn add_light(&mut self, parent: Option<ObjectId>, intensity: f32) -> HalationResult<ObjectId> {
        self.insert(parent, ObjectKind::Light { intensity })
    }

    /// Remove `id` and its subtree, returning every removed id.
    pub fn remove(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let removed = self.subtree(id);
        if let Some(parent) = self.get(id).and_then(|o| o.parent)
            && let Some(p) = self.get_mut(parent)
        {
            p.children.retain(|c| *c != id);
        }
        for r in &removed {
            if let Some(slot) = self.objects.get_mut(r.0 as usize) {
                *slot = None;
            }
        }
        removed
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().flatten()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.objects().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `id` followed by all of its transitive children, depth first. Empty if `id` is unknown.
    pub fn subtree(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(obj) = self.get(cur) else {
                continue;
            };
            out.push(cur);
            stack.extend(obj.children.iter().rev().copied());
        }
        out
    }
}

/// View of the scene. Projection is an axis-aligned mapping of `view` world units onto whatever
/// target is bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub layers: LayerMask,
    pub view: SurfaceSize,
}

impl Camera {
    pub fn orthographic(view: SurfaceSize) -> Self {
        Self {
            layers: LayerMask::DEFAULT,
            view,
        }
    }
}

/// One object to be rendered through its own effect chain this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterTarget {
    pub object: ObjectId,
    pub effects: EffectChain,
    /// Content signature of `effects`; equal keys imply equal output at equal quality.
    pub effects_key: String,
    /// The object's own appearance changed this frame.
    pub dirty: bool,
}

impl FilterTarget {
    /// Target keyed by [`EffectChain::signature`].
    pub fn new(object: ObjectId, effects: EffectChain) -> Self {
        let effects_key = effects.signature();
        Self {
            object,
            effects,
            effects_key,
            dirty: false,
        }
    }

    pub fn with_key(mut self, effects_key: impl Into<String>) -> Self {
        self.effects_key = effects_key.into();
        self
    }

    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
