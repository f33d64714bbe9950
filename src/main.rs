use clap::{value_parser, Arg, ArgMatches, Command};
use kinflow::{Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn input_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("snp")
            .long("snp")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("SNP call-set path"),
    )
    .arg(
        Arg::new("indel")
            .long("indel")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("INDEL call-set path"),
    )
    .arg(
        Arg::new("sv")
            .long("sv")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("SV call-set path"),
    )
    .arg(
        Arg::new("pheno-dir")
            .long("pheno-dir")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Directory of tab-separated phenotype files"),
    )
    .arg(
        Arg::new("covar")
            .long("covar")
            .value_parser(value_parser!(PathBuf))
            .help("Optional covariate file"),
    )
    .arg(
        Arg::new("out")
            .long("out")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Output root directory"),
    )
    .arg(
        Arg::new("maf")
            .long("maf")
            .default_value("0.01")
            .value_parser(value_parser!(f64))
            .help("Allele-frequency threshold"),
    )
    .arg(
        Arg::new("power")
            .long("power")
            .default_value("-0.25")
            .value_parser(value_parser!(f64))
            .allow_negative_numbers(true)
            .help("Kinship power exponent"),
    )
    .arg(
        Arg::new("ld-window")
            .long("ld-window")
            .default_value("0.98")
            .value_parser(value_parser!(f64))
            .help("LD-pruning threshold"),
    )
    .arg(
        Arg::new("threads")
            .long("threads")
            .default_value("4")
            .value_parser(value_parser!(usize))
            .help("Worker-count hint passed to each tool"),
    )
}

fn config_from(args: &ArgMatches) -> PipelineConfig {
    PipelineConfig {
        snp_vcf: args.get_one::<PathBuf>("snp").unwrap().clone(),
        indel_vcf: args.get_one::<PathBuf>("indel").unwrap().clone(),
        sv_vcf: args.get_one::<PathBuf>("sv").unwrap().clone(),
        pheno_dir: args.get_one::<PathBuf>("pheno-dir").unwrap().clone(),
        covar: args.get_one::<PathBuf>("covar").cloned(),
        out_dir: args.get_one::<PathBuf>("out").unwrap().clone(),
        maf: *args.get_one::<f64>("maf").unwrap(),
        power: *args.get_one::<f64>("power").unwrap(),
        ld_window: *args.get_one::<f64>("ld-window").unwrap(),
        threads: *args.get_one::<usize>("threads").unwrap(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("kinflow")
        .version("0.1.0")
        .about("Multi-GRM heritability pipeline")
        .subcommand_required(true)
        .subcommand(input_args(Command::new("run").about("Execute the full pipeline")))
        .subcommand(input_args(
            Command::new("plan").about("Print the task graph without running anything"),
        ))
        .subcommand(input_args(
            Command::new("validate").about("Check inputs without running anything"),
        ));

    let matches = cli.get_matches();

    let code = match matches.subcommand() {
        Some(("run", args)) => run(config_from(args)).await,
        Some(("plan", args)) => plan(config_from(args)),
        Some(("validate", args)) => validate(config_from(args)),
        _ => 2,
    };
    std::process::exit(code);
}

async fn run(config: PipelineConfig) -> i32 {
    let pipeline = Pipeline::new(config);
    match pipeline.run().await {
        Ok(summary) => {
            println!("Pipeline completed.");
            println!("  Tasks completed: {}", summary.tasks_completed);
            println!("  Estimates:       {}", summary.estimates);
            println!("  Summary:         {}", summary.summary_dir.display());
            println!("  Event log:       {}", summary.events_path.display());
            0
        }
        Err(err) => {
            eprintln!("Pipeline failed: {err}");
            1
        }
    }
}

fn plan(config: PipelineConfig) -> i32 {
    let pipeline = Pipeline::new(config);
    match pipeline.plan() {
        Ok(plan) => {
            println!("{}", plan.summary());
            match plan.dag().topological_sort() {
                Ok(order) => {
                    println!();
                    for id in order {
                        if let Some(spec) = plan.task(id) {
                            println!("  {}", spec.label());
                        }
                    }
                    0
                }
                Err(err) => {
                    eprintln!("Plan is not schedulable: {err}");
                    1
                }
            }
        }
        Err(err) => {
            eprintln!("Planning failed: {err}");
            1
        }
    }
}

fn validate(config: PipelineConfig) -> i32 {
    let pipeline = Pipeline::new(config);
    match pipeline.validate() {
        Ok(summary) => {
            println!("Inputs valid.");
            println!("  Phenotype files: {}", summary.phenotypes);
            0
        }
        Err(err) => {
            eprintln!("Validation failed: {err}");
            1
        }
    }
}
