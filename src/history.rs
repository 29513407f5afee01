use nalgebra::{
    Point2,
    Vector2,
};

use crate::movement::MovementType;

/// Kinematic snapshot of the source, as seen from some distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistorySlot {
    pub position: Point2<f64>,
    pub acceleration: Vector2<f64>,

    /// Peak acceleration of the movement that was active when this slot was
    /// recorded. Consumers use it to normalize their visual scale.
    pub max_acceleration: f64,

    pub movement: MovementType,
}

impl HistorySlot {
    /// A source that has always been sitting still at `position`.
    pub fn stationary(position: Point2<f64>, movement: MovementType) -> Self {
        Self {
            position,
            acceleration: Vector2::zeros(),
            max_acceleration: 0.0,
            movement,
        }
    }
}

/// Fixed-capacity motion history, indexed by distance from the source.
///
/// Since the propagation speed is constant, a time delay maps onto an offset
/// into this buffer: slot `0` is "here, now" and slot `capacity - 1` is the
/// furthest (oldest) state that can be expressed. Every recorded tick pushes
/// the history outwards by `step_size` slots.
#[derive(Clone, Debug)]
pub struct MotionHistory {
    slots: Box<[HistorySlot]>,
}

impl MotionHistory {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, initial: HistorySlot) -> Self {
        assert!(capacity > 0, "motion history needs at least one slot");
        Self {
            slots: vec![initial; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn clamp_index(&self, index: isize) -> usize {
        // `capacity > 0`, so the upper bound is always valid
        index.clamp(0, self.slots.len() as isize - 1) as usize
    }

    /// Returns the slot at `index`, saturating out-of-range indices to the
    /// nearest end of the buffer.
    pub fn query(&self, index: isize) -> &HistorySlot {
        &self.slots[self.clamp_index(index)]
    }

    /// Same as [`query`](Self::query), but for a (non-negative) distance.
    /// The distance is floored to a slot index.
    pub fn query_distance(&self, distance: f64) -> &HistorySlot {
        // `as` saturates, and NaN becomes 0
        self.query(distance.floor() as isize)
    }

    /// Pushes the history outwards by `step_size` slots and writes `new_state`
    /// into the freed slots at the front.
    ///
    /// The acceleration in the freed slots is interpolated linearly from
    /// `new_state.acceleration` (slot 0, exact) towards the acceleration that
    /// was at the front before the shift. Everything else is copied verbatim.
    ///
    /// # Panics
    ///
    /// Panics if `step_size` exceeds the capacity.
    pub fn shift(&mut self, new_state: &HistorySlot, step_size: usize) {
        let capacity = self.slots.len();
        assert!(
            step_size <= capacity,
            "step size {step_size} exceeds history capacity {capacity}"
        );

        let previous_acceleration = self.slots[0].acceleration;

        // slot `i` receives slot `i - step_size`, oldest data falls off the end
        self.slots.copy_within(0..capacity - step_size, step_size);

        for (i, slot) in self.slots[..step_size].iter_mut().enumerate() {
            let t = i as f64 / step_size as f64;
            *slot = HistorySlot {
                acceleration: new_state.acceleration.lerp(&previous_acceleration, t),
                ..*new_state
            };
        }
    }

    /// Returns `true` if no acceleration was recorded in any slot up to and
    /// including `index`, i.e. the wavefront hasn't reached that distance yet.
    pub fn is_disturbance_absent_up_to(&self, index: isize) -> bool {
        let end = self.clamp_index(index);
        self.slots[..=end]
            .iter()
            .all(|slot| slot.acceleration == Vector2::zeros())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySlot> {
        self.slots.iter()
    }
}
