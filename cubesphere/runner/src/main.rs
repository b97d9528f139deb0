//! Cubed-sphere test-case runner.
//!
//! Usage: `cubesphere [parameters.json]`. Without an argument the built-in defaults are used.
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use engine::config::{ConfigError, Parameters, RunConfig, SubCase, TestCase};
use engine::diagnostics::{convergence_rates, divergence_test, grid_quality, interpolation_test};
use engine::grid::cache::{CacheStore, FileCache};
use engine::grid::{build_grid, CubedSphere};
use engine::stepper::{run_convergence, Simulation};
use engine::LatLonGrid;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("[run] cubesphere engine v{}", engine::version());
    let path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = match load(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = run(&cfg) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn load(path: Option<PathBuf>) -> Result<RunConfig> {
    let params = match &path {
        Some(p) => Parameters::from_path(p).with_context(|| format!("reading {}", p.display()))?,
        None => {
            info!("[run] no parameter file given, using defaults");
            Parameters::default()
        }
    };
    match params.validate() {
        Ok(cfg) => {
            info!(
                "[run] N={} projection={} test_case={:?} map={}",
                cfg.n, cfg.projection, cfg.test_case, params.map_projection
            );
            Ok(cfg)
        }
        Err(e @ (ConfigError::InvalidTestCase(_) | ConfigError::InvalidSubCase(_))) => {
            Err(anyhow::Error::new(e).context("unknown test case"))
        }
        Err(e) => Err(e.into()),
    }
}

fn run(cfg: &RunConfig) -> Result<()> {
    let mut cache = FileCache::new(&cfg.cache_dir);
    match cfg.test_case {
        TestCase::GridGeneration => {
            let grid = grid_at(cfg, cfg.n, &mut cache)?;
            let summary = serde_json::json!({
                "n": grid.n,
                "projection": grid.projection.id(),
                "cells": 6 * grid.n * grid.n,
                "dx": grid.dx,
                "total_area": grid.total_area(),
                "cache_file": cache.path(&grid.key()),
            });
            info!("[grid] N={} cells={} area={:.12}", grid.n, 6 * grid.n * grid.n, grid.total_area());
            show(cfg, &summary)
        }
        TestCase::GridQuality => {
            let grid = grid_at(cfg, cfg.n, &mut cache)?;
            let q = grid_quality(&grid);
            info!(
                "[grid] area ratio={:.4} max aspect={:.4} min angle={:.2}deg",
                q.area_ratio, q.aspect_max, q.min_angle_deg
            );
            show(cfg, &q)
        }
        TestCase::Interpolation => {
            let (nlon, nlat) = cfg.latlon;
            let mut reports = Vec::with_capacity(cfg.resolutions.len());
            for &n in &cfg.resolutions {
                let grid = grid_at(cfg, n, &mut cache)?;
                let mut ll = LatLonGrid::regular(nlon, nlat);
                let r = interpolation_test(&grid, &mut ll, cfg.interpolation_ic);
                if r.masked > 0 {
                    warn!("[interp] N={} {} samples masked at singular points", n, r.masked);
                }
                info!("[interp] N={:4} L1={:.4e} L2={:.4e} Linf={:.4e}", n, r.norms.l1, r.norms.l2, r.norms.linf);
                reports.push(r);
            }
            let ns: Vec<usize> = reports.iter().map(|r| r.n).collect();
            let linf: Vec<f64> = reports.iter().map(|r| r.norms.linf).collect();
            let rates = convergence_rates(&ns, &linf);
            show(cfg, &serde_json::json!({ "levels": reports, "linf_rates": rates }))
        }
        TestCase::Divergence(SubCase::Single) => {
            let grid = grid_at(cfg, cfg.n, &mut cache)?;
            let r = divergence_test(&grid, &cfg.divergence)?;
            info!("[div] N={} L2={:.4e} max|div|={:.4e}", r.n, r.norms.l2, r.max_abs);
            show(cfg, &r)
        }
        TestCase::Divergence(SubCase::Convergence) => {
            let mut reports = Vec::with_capacity(cfg.resolutions.len());
            for &n in &cfg.resolutions {
                let grid = grid_at(cfg, n, &mut cache)?;
                let r = divergence_test(&grid, &cfg.divergence)?;
                info!("[div] N={:4} L1={:.4e} L2={:.4e} Linf={:.4e}", n, r.norms.l1, r.norms.l2, r.norms.linf);
                reports.push(r);
            }
            let ns: Vec<usize> = reports.iter().map(|r| r.n).collect();
            let l2: Vec<f64> = reports.iter().map(|r| r.norms.l2).collect();
            let rates = convergence_rates(&ns, &l2);
            for (w, r) in ns.windows(2).zip(&rates) {
                info!("[div] order {}->{}: {:.2}", w[0], w[1], r);
            }
            show(cfg, &serde_json::json!({ "levels": reports, "l2_rates": rates }))
        }
        TestCase::Advection(SubCase::Single) => {
            let grid = grid_at(cfg, cfg.n, &mut cache)?;
            let report = Simulation::new(&grid, cfg.advection)?.run()?;
            if let Some(e) = report.errors {
                info!("[adv] L1={:.4e} L2={:.4e} Linf={:.4e}", e.l1, e.l2, e.linf);
            }
            show(cfg, &report)
        }
        TestCase::Advection(SubCase::Convergence) => {
            let store: &mut dyn CacheStore = &mut cache;
            let report = run_convergence(&cfg.resolutions, cfg.projection, cfg.advection, cfg.grid_load, Some(store))?;
            for (w, r) in report.levels.windows(2).zip(&report.rates) {
                info!("[adv] order {}->{}: L1 {:.2} L2 {:.2} Linf {:.2}", w[0].n, w[1].n, r[0], r[1], r[2]);
            }
            show(cfg, &report)
        }
    }
}

fn grid_at(cfg: &RunConfig, n: usize, cache: &mut FileCache) -> Result<CubedSphere> {
    let n_i = i64::try_from(n).context("resolution out of range")?;
    let grid = build_grid(n_i, cfg.projection.id(), cfg.grid_load, Some(cache))?;
    Ok(grid)
}

fn show<T: Serialize>(cfg: &RunConfig, value: &T) -> Result<()> {
    if cfg.show_on_screen {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
