/*!
Particle-trajectory and deposit-removal simulation for the cleaning of orifice chambers.

Cleaning media particles are injected through the roof inlet, carried down by the gas stream,
bounce off the wall and the perforated grid plates and knock deposit off the surfaces they hit.
*/

mod platform;
mod simulation;

pub use simulation::*;

pub use platform::start;
