use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser};
use log::{error, info};

use xisensor::{ConsoleTuner, FixedSelection, Selection, SensorConfig, XimeaSensor};

#[derive(Debug, Args)]
struct ConfigArgs {
    /// sensor configuration (TOML); defaults are used if not given
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<SensorConfig> {
        match &self.config {
            Some(path) => SensorConfig::from_toml_path(path)
                .with_context(|| format!("reading {}", path.display())),
            None => Ok(SensorConfig::default()),
        }
    }
}

#[derive(Debug, Args)]
struct Grab {
    #[command(flatten)]
    config: ConfigArgs,

    /// number of frames to save
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// directory the frames are written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct Calibrate {
    #[command(flatten)]
    config: ConfigArgs,

    /// zone of interest as XMIN,YMIN,XMAX,YMAX in frame pixels
    #[arg(long, value_parser = parse_zoi)]
    zoi: Option<Selection>,

    /// write the calibrated configuration here
    #[arg(long)]
    save: Option<PathBuf>,
}

/// XIMEA sensor utilities
#[derive(Debug, Parser)]
#[command(name = "xisensor", author, version)]
enum Command {
    /// list connected cameras
    List,
    /// open a camera and print its settings
    Info(ConfigArgs),
    /// save frames as PNG
    Grab(Grab),
    /// tune exposure and gain, then set the zone of interest
    Calibrate(Calibrate),
}

fn parse_zoi(s: &str) -> Result<Selection, String> {
    let v = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    match v.as_slice() {
        &[x1, y1, x2, y2] => Selection::from_corners((x1, y1), (x2, y2))
            .ok_or_else(|| "zone is smaller than 5 pixels".to_string()),
        _ => Err("expected XMIN,YMIN,XMAX,YMAX".to_string()),
    }
}

fn open_sensor(config: SensorConfig) -> anyhow::Result<XimeaSensor> {
    let mut sensor = XimeaSensor::from_config(config);
    let stop = sensor.stop_handle();
    ctrlc::set_handler(move || stop.request_stop()).context("installing Ctrl-C handler")?;
    sensor.open()?;
    Ok(sensor)
}

fn list() -> anyhow::Result<()> {
    let count = xisensor::number_devices()?;
    println!("{} device(s)", count);
    for i in 0..count {
        match xisensor::open_device(Some(i)).and_then(|cam| cam.device_name()) {
            Ok(name) => println!("{}: {}", i, name),
            Err(e) => error!("device {}: {}", i, e),
        }
    }
    Ok(())
}

fn grab(args: Grab) -> anyhow::Result<()> {
    let mut sensor = open_sensor(args.config.load()?)?;
    std::fs::create_dir_all(&args.out)?;
    for i in 0..args.count {
        let frame = sensor.get_image()?;
        let path = args.out.join(format!("frame{:05}.png", i));
        frame.save(&path)?;
        info!("saved {:?} to {}", frame, path.display());
    }
    sensor.close();
    Ok(())
}

fn calibrate(args: Calibrate) -> anyhow::Result<()> {
    let mut sensor = open_sensor(args.config.load()?)?;
    let stdin = std::io::stdin();
    let mut tuner = ConsoleTuner::new(stdin.lock(), std::io::stdout());
    let mut selector = FixedSelection(args.zoi);
    let config = sensor.calibrate(&mut tuner, &mut selector)?.clone();
    println!("{}", sensor);
    if let Some(path) = args.save {
        config.save(&path)?;
        info!("configuration written to {}", path.display());
    }
    sensor.close();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "xisensor=info,warn");
    }
    env_logger::init();

    match Command::parse() {
        Command::List => list()?,
        Command::Info(args) => {
            let mut sensor = open_sensor(args.load()?)?;
            println!("{}", sensor);
            sensor.close();
        }
        Command::Grab(args) => grab(args)?,
        Command::Calibrate(args) => calibrate(args)?,
    }
    Ok(())
}
