//! The listener: the shared point of view for every spatializer node.
//!
//! One listener per context. The control thread assigns fields with plain
//! atomic stores (no lock — the same contract as parameter targets) and the
//! renderer snapshots the whole record once per quantum, so every
//! spatializer in the graph sees one consistent listener per block.

use resona_core::Vec3;

use crate::param::AtomicF32;

/// Default speed of sound in m/s.
const DEFAULT_SPEED_OF_SOUND: f32 = 343.3;

pub(crate) struct ListenerShared {
    position: [AtomicF32; 3],
    orientation: [AtomicF32; 3],
    up: [AtomicF32; 3],
    velocity: [AtomicF32; 3],
    doppler_factor: AtomicF32,
    speed_of_sound: AtomicF32,
}

fn atomic_vec3(x: f32, y: f32, z: f32) -> [AtomicF32; 3] {
    [AtomicF32::new(x), AtomicF32::new(y), AtomicF32::new(z)]
}

fn store_vec3(cells: &[AtomicF32; 3], v: Vec3) {
    cells[0].store(v.x);
    cells[1].store(v.y);
    cells[2].store(v.z);
}

fn load_vec3(cells: &[AtomicF32; 3]) -> Vec3 {
    Vec3::new(cells[0].load(), cells[1].load(), cells[2].load())
}

impl ListenerShared {
    pub(crate) fn new() -> Self {
        Self {
            position: atomic_vec3(0.0, 0.0, 0.0),
            // Facing -z with +y up puts the listener's right on +x.
            orientation: atomic_vec3(0.0, 0.0, -1.0),
            up: atomic_vec3(0.0, 1.0, 0.0),
            velocity: atomic_vec3(0.0, 0.0, 0.0),
            doppler_factor: AtomicF32::new(1.0),
            speed_of_sound: AtomicF32::new(DEFAULT_SPEED_OF_SOUND),
        }
    }

    pub(crate) fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            position: load_vec3(&self.position),
            orientation: load_vec3(&self.orientation),
            up: load_vec3(&self.up),
            velocity: load_vec3(&self.velocity),
            doppler_factor: self.doppler_factor.load(),
            speed_of_sound: self.speed_of_sound.load(),
        }
    }
}

/// Control-thread view of the context's listener.
pub struct AudioListener<'a> {
    pub(crate) shared: &'a ListenerShared,
}

impl AudioListener<'_> {
    pub fn set_position(&self, x: f32, y: f32, z: f32) {
        store_vec3(&self.shared.position, Vec3::new(x, y, z));
    }

    /// The direction the listener faces.
    pub fn set_orientation(&self, x: f32, y: f32, z: f32) {
        store_vec3(&self.shared.orientation, Vec3::new(x, y, z));
    }

    pub fn set_up_vector(&self, x: f32, y: f32, z: f32) {
        store_vec3(&self.shared.up, Vec3::new(x, y, z));
    }

    pub fn set_velocity(&self, x: f32, y: f32, z: f32) {
        store_vec3(&self.shared.velocity, Vec3::new(x, y, z));
    }

    /// Scale for the Doppler effect. Zero or negative disables it.
    pub fn set_doppler_factor(&self, factor: f32) {
        self.shared.doppler_factor.store(factor);
    }

    pub fn set_speed_of_sound(&self, speed: f32) {
        self.shared.speed_of_sound.store(speed);
    }
}

/// Immutable listener state for one quantum.
#[derive(Clone, Copy, Debug)]
pub struct ListenerSnapshot {
    pub position: Vec3,
    pub orientation: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    pub doppler_factor: f32,
    pub speed_of_sound: f32,
}

impl Default for ListenerSnapshot {
    fn default() -> Self {
        ListenerShared::new().snapshot()
    }
}
