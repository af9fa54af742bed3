// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nalgebra::Vector3;
use tracing_subscriber::EnvFilter;

use eikonal_jmm::jet::Jet3;
use eikonal_jmm::tetra_update::TetraUpdate;
use eikonal_jmm::tri_update::TriUpdate;

#[derive(Parser)]
#[command(name = "eikonal-jmm", about = "Solve a single jet marching local update")]
struct Cli {
    /// Log solver fallbacks to stderr (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Edge update from two base points
    Tri(UpdateArgs),
    /// Face update from three base points
    Tetra(UpdateArgs),
}

#[derive(Args)]
struct UpdateArgs {
    /// Target point, comma-separated (e.g., 1,0.5,0)
    #[arg(long)]
    target: String,

    /// Base point, comma-separated (repeat once per base vertex)
    #[arg(long, num_args = 1)]
    base: Vec<String>,

    /// Base jet as f,fx,fy,fz (repeat once per base vertex, same order)
    #[arg(long, num_args = 1)]
    jet: Vec<String>,

    /// Also estimate the Hessian by central differences with this step
    /// (edge updates only)
    #[arg(long)]
    hessian_step: Option<f64>,
}

fn parse_floats(s: &str, what: &str, n: usize) -> Result<Vec<f64>> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{what}: expected comma-separated floats"))?;
    if parts.len() != n {
        bail!("--{} has {} components, expected {}", what, parts.len(), n);
    }
    Ok(parts)
}

fn parse_point(s: &str, what: &str) -> Result<Vector3<f64>> {
    let p = parse_floats(s, what, 3)?;
    Ok(Vector3::new(p[0], p[1], p[2]))
}

fn parse_jet(s: &str) -> Result<Jet3> {
    let p = parse_floats(s, "jet", 4)?;
    Ok(Jet3::new(p[0], Vector3::new(p[1], p[2], p[3])))
}

fn parse_base<const N: usize>(args: &UpdateArgs) -> Result<([Vector3<f64>; N], [Jet3; N])> {
    if args.base.len() != N {
        bail!("expected {} --base points, got {}", N, args.base.len());
    }
    if args.jet.len() != N {
        bail!("expected {} --jet values, got {}", N, args.jet.len());
    }
    let mut xs = [Vector3::zeros(); N];
    let mut jets = [Jet3::empty(); N];
    for i in 0..N {
        xs[i] = parse_point(&args.base[i], "base")?;
        jets[i] = parse_jet(&args.jet[i])?;
    }
    Ok((xs, jets))
}

fn print_jet(jet: &Jet3) {
    println!("value     = {:.15}", jet.f);
    println!(
        "gradient  = [{:.15}, {:.15}, {:.15}]",
        jet.df.x, jet.df.y, jet.df.z
    );
}

fn run_tri(args: &UpdateArgs) -> Result<()> {
    let x = parse_point(&args.target, "target")?;
    let (xs, jets) = parse_base::<2>(args)?;

    let mut update = TriUpdate::from_raw(x, xs, jets).context("failed to set up edge update")?;
    update.solve().context("edge update failed")?;

    if let Some(lam) = update.lambda() {
        println!("lambda    = {:.15}", lam);
    }
    print_jet(&update.jet()?);
    println!("interior  = {}", update.has_interior_point_solution());
    println!("causal    = {}", update.is_causal());
    println!("degenerate = {}", update.is_degenerate());

    if let Some(h) = args.hessian_step {
        let hess = update
            .approx_hessian(h)
            .context("finite difference Hessian failed")?;
        println!("hessian   =");
        for row in hess.row_iter() {
            println!("  [{:.10}, {:.10}, {:.10}]", row[0], row[1], row[2]);
        }
    }
    Ok(())
}

fn run_tetra(args: &UpdateArgs) -> Result<()> {
    if args.hessian_step.is_some() {
        bail!("--hessian-step is only supported for edge updates");
    }
    let x = parse_point(&args.target, "target")?;
    let (xs, jets) = parse_base::<3>(args)?;

    let mut update = TetraUpdate::from_raw(x, xs, jets).context("failed to set up face update")?;
    update.solve(None).context("face update failed")?;

    if let Some(b) = update.bary() {
        println!("bary      = [{:.15}, {:.15}, {:.15}]", b[0], b[1], b[2]);
    }
    println!("iters     = {}", update.num_iters());
    print_jet(&update.jet()?);
    println!("interior  = {}", update.has_interior_point_solution());
    println!("backwards = {}", update.is_backwards());
    println!("degenerate = {}", update.is_degenerate());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Tri(args) => run_tri(args),
        Command::Tetra(args) => run_tetra(args),
    }
}
