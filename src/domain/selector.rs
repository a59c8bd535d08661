use crate::domain::models::ItemId;
use rand::Rng;

/// Uniform pick: `floor(u * len)` for `u` drawn from [0, 1).
pub fn pick<R: Rng>(pool: &[ItemId], rng: &mut R) -> Option<ItemId> {
    if pool.is_empty() {
        return None;
    }
    let unit: f64 = rng.gen_range(0.0..1.0);
    let index = ((unit * pool.len() as f64).floor() as usize).min(pool.len() - 1);
    pool.get(index).cloned()
}
