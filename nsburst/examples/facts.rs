//! Print the system facts and counter commands for one NetScreen device.
//!
//! Opens a session, reads `get hostname` and `get system`, and lists the
//! counter commands the detector would issue for that product. No counters
//! are read.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example facts -- --host 192.0.2.10 --user netscreen --password secret
//! ```

use std::env;
use std::time::Duration;

use nsburst::{Driver, DriverBuilder, PlatformRegistry, facts};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG=debug to see the session traffic
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);
    let mut driver = DriverBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .timeout(Duration::from_secs(args.timeout))
        .connect()
        .await?;

    let facts = facts::extract(&mut driver).await?;
    println!("{}", "-".repeat(50));
    println!("Hostname:        {}", facts.hostname);
    println!("Product:         {}", facts.product);
    println!("Serial number:   {}", facts.serial_number);
    println!("Control number:  {}", facts.control_number);
    println!("Version:         {}", facts.version);
    println!("Type:            {}", facts.device_type);
    println!("{}", "-".repeat(50));

    match PlatformRegistry::global().get(&facts.product) {
        Some(platform) => {
            println!("Counter commands for {}:", platform.product);
            for &asic in platform.topology.asic_ids {
                for &qmu in platform.topology.qmu_ids {
                    println!("  {}", platform.command.render(asic, qmu));
                }
            }
        }
        None => println!("No ASIC topology known for {:?}", facts.product),
    }

    driver.close().await?;
    Ok(())
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: "netscreen".to_string(),
            password: env::var("NSBURST_PASSWORD").unwrap_or_default(),
            timeout: 10,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(22),
                ("--user" | "-u", Some(v)) => parsed.user = v,
                ("--password" | "-P", Some(v)) => parsed.password = v,
                ("--timeout" | "-t", Some(v)) => parsed.timeout = v.parse().unwrap_or(10),
                (other, _) => {
                    eprintln!("Unknown or incomplete argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }
        parsed
    }
}
