mod common;

use approx::assert_relative_eq;
use common::run;

def_test!(
IN[]
OUT[output = "detections.txt"]
fn aimed_straight_line_primaries_reach_observer {
    run([
        "simulate",
        output,
        "--overwrite",
        "--primaries=20",
        "--threads=2",
        "--source-distance=50",
        "--towards-observer",
        "--observer-radius=1",
        "--energy=20",
        "--no-redshift-evolution",
        "--max-step=2",
        "--columns=primary_index,source_energy",
    ]);
    common::assert_file_exists(output);
    assert!(common::read_output_header(output).ends_with("primary\tE0[EeV]"));

    let rows = common::read_output_rows(output);
    assert_eq!(rows.len(), 20);
    for row in rows {
        assert_eq!(row.len(), 12);
        assert_eq!(row[0], 2212.0);
        assert_relative_eq!(row[1], 20.0, max_relative = 1e-6);
        assert_relative_eq!(row[9], 49.0, max_relative = 1e-4);
    }
});

def_test!(
IN[]
OUT[output = "detections.txt"]
fn redshifts_decrease_along_trajectories {
    run([
        "simulate",
        output,
        "--overwrite",
        "--primaries=5",
        "--source-distance=100",
        "--towards-observer",
        "--redshift-from-distance",
        "--energy=50",
        "--max-step=5",
    ]);
    let rows = common::read_output_rows(output);
    assert_eq!(rows.len(), 5);
    for row in rows {
        assert!(row[8] >= 0.0);
        assert!(row[8] < 1e-3);
        assert!(row[1] < 50.0);
    }
});

def_test!(
IN[table = "photo_pion_cmb.txt"]
OUT[output = "detections.txt"]
fn photo_pion_losses_lower_detected_energies {
    run([
        "simulate",
        output,
        "--overwrite",
        "--primaries=30",
        "--source-distance=100",
        "--towards-observer",
        "--energy=300",
        "--no-redshift-evolution",
        "--photo-pion-table",
        table,
        "--min-energy=1",
    ]);
    let rows = common::read_output_rows(output);
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row[1] <= 300.0 + 1e-6));
    assert!(rows.iter().any(|row| row[1] < 300.0 * 0.9));
});

def_test!(
IN[]
OUT[output = "detections.txt"]
fn periodic_box_brings_particles_back_to_observer {
    run([
        "simulate",
        output,
        "--overwrite",
        "--primaries=4",
        "--box-size=20",
        "--source-position=2,10,10",
        "--direction=-1,0,0",
        "--observer-radius=1",
        "--no-redshift-evolution",
        "--max-step=1",
    ]);
    let rows = common::read_output_rows(output);
    assert_eq!(rows.len(), 4);
    for row in rows {
        assert_relative_eq!(row[9], 11.0, max_relative = 1e-4);
        assert_relative_eq!(row[2], -9.0, max_relative = 1e-4);
    }
});

def_test!(
IN[table = "photo_pion_cmb.txt"]
OUT[output = "detections.txt"]
fn finer_step_limit_fraction_still_detects_primaries {
    run([
        "simulate",
        output,
        "--overwrite",
        "--primaries=10",
        "--source-distance=20",
        "--towards-observer",
        "--energy=300",
        "--no-redshift-evolution",
        "--photo-pion-table",
        table,
        "--step-limit-fraction=0.02",
        "--min-energy=1",
    ]);
    let rows = common::read_output_rows(output);
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row[1] <= 300.0 + 1e-6));
});
