mod options;
mod parameterization;
mod phase_info;
mod registry;
mod trajectory;
