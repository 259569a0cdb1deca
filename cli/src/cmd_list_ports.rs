use cpal::traits::{DeviceTrait, HostTrait};

use crate::app_error::*;

/// One line per device: its name, whether it's the default, and the stream
/// format `live` would open it with.
fn describe_device(name: &str,
                   is_default: bool,
                   config: Result<cpal::SupportedStreamConfig, cpal::DefaultStreamConfigError>) -> String {
    let marker = if is_default { " (default)" } else { "" };
    match config {
        Ok(config) => format!(" • {}{}: {} Hz, {} channels, {:?}",
                              name, marker, config.sample_rate().0, config.channels(), config.sample_format()),
        Err(error) => format!(" • {}{}: unusable ({})", name, marker, error),
    }
}

pub fn run_list_ports() -> Result<(), AppError> {
    let host = cpal::default_host();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    println!("Audio input devices for host {}:", host.id().name());
    for dev in host.input_devices()? {
        let name = dev.name()?;
        let is_default = default_input.as_deref() == Some(name.as_str());
        println!("{}", describe_device(&name, is_default, dev.default_input_config()));
    }

    println!();
    let default_output = host.default_output_device().and_then(|d| d.name().ok());
    println!("Audio output devices for host {}:", host.id().name());
    for dev in host.output_devices()? {
        let name = dev.name()?;
        let is_default = default_output.as_deref() == Some(name.as_str());
        println!("{}", describe_device(&name, is_default, dev.default_output_config()));
    }

    Ok(())
}
