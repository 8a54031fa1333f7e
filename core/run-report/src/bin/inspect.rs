//! Inspect a .grs run report

use run_report::RunReport;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: inspect <report_file> [--json]");
        std::process::exit(1);
    }

    let path = &args[1];
    println!("Loading {}...", path);

    let report = match RunReport::read_from(path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Failed to read report: {}", e);
            std::process::exit(1);
        }
    };

    if args.iter().any(|a| a == "--json") {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode report: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("\n=== Run ===");
    println!("Machines: {}", report.machines.len());
    println!("Horizon: {}", report.metadata.horizon);
    println!("Mean inter-arrival: {}", report.metadata.task_arrival_mean);
    println!();
    print!("{}", report.render(true));
}
