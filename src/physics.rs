use nalgebra::Vector2;

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("Speed {speed} is not below the propagation speed {propagation_speed}")]
pub struct SuperluminalSpeed {
    pub speed: f64,
    pub propagation_speed: f64,
}

/// `m = m_0 / sqrt(1 - (|v| / c)^2)`
///
/// Fails if `|v| >= c`, since the mass isn't defined there. Non-finite inputs
/// fail the same way.
pub fn relativistic_mass(
    rest_mass: f64,
    velocity: &Vector2<f64>,
    propagation_speed: f64,
) -> Result<f64, SuperluminalSpeed> {
    let speed = velocity.norm();

    // written so that NaN ends up in the error branch
    if !(speed < propagation_speed) || !propagation_speed.is_finite() {
        return Err(SuperluminalSpeed {
            speed,
            propagation_speed,
        });
    }

    let beta = speed / propagation_speed;
    Ok(rest_mass / (1.0 - beta * beta).sqrt())
}
