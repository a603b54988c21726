/*
 * Copyright (c) 2022. XIMEA GmbH - All Rights Reserved
 */
use xisensor::{SensorConfig, XimeaSensor};

fn main() -> xisensor::Result<()> {
    let config = SensorConfig {
        exposure_us: 10000.0,
        ..Default::default()
    };
    let mut sensor = XimeaSensor::from_config(config);
    sensor.open()?;

    for _ in 0..10 {
        let frame = sensor.get_image()?;
        match frame.sample(0, 0) {
            Some(value) => println!("Frame {} received, first pixel: {}", frame.nframe, value),
            None => unreachable!("Could not get pixel value from frame!"),
        }
    }
    sensor.close();
    Ok(())
}
