/*
 * Copyright (c) 2024. XIMEA GmbH - All Rights Reserved
 */
use xisensor::{FixedSelection, NoTuning, Selection, SensorConfig, XimeaSensor};

fn main() -> xisensor::Result<()> {
    let mut sensor = XimeaSensor::from_config(SensorConfig::default()); // Full sensor, 8 bit mono
    sensor.open()?;

    // Keep the configured exposure and stream only a 512x512 zone
    let mut selector = FixedSelection(Selection::from_corners((256.0, 256.0), (768.0, 768.0)));
    sensor.calibrate(&mut NoTuning, &mut selector)?;
    println!("{}", sensor);

    let frame = sensor.get_image()?; // Get the next frame of the zone
    frame.save("zoi.png")?; // Save the frame to a file

    Ok(())
}
