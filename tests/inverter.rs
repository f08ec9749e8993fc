use core::f32::consts::{PI, TAU};
use gridtie::{
    Abc, FaultKind, FaultLog, FaultSet, GateDrive, Inverter, Mode, SampleFrame, SensorBank,
    StartupConfig,
};

const T_S: f32 = 50e-6;
const W_GRID: f32 = 2. * PI * 50.;
const V_PEAK: f32 = 310.;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn frame(currents: Abc, v_dc: f32, temperature: f32) -> SampleFrame {
    SampleFrame {
        currents,
        voltages: Abc::default(),
        v_dc,
        temperature,
    }
}

/// Ideal grid whose angle advances by one sample period per call.
struct Grid {
    angle: f32,
    magnitude: f32,
}

impl Grid {
    fn new() -> Self {
        Self {
            angle: 0.,
            magnitude: V_PEAK,
        }
    }

    fn next(&mut self) -> SampleFrame {
        let angle = self.angle;
        self.angle = (self.angle + W_GRID * T_S) % TAU;
        SampleFrame {
            currents: Abc::default(),
            voltages: Abc::new(
                self.magnitude * angle.cos(),
                self.magnitude * (angle - TAU / 3.).cos(),
                self.magnitude * (angle + TAU / 3.).cos(),
            ),
            v_dc: 700.,
            temperature: 25.,
        }
    }
}

#[derive(Default)]
struct Recorder {
    records: Vec<(FaultSet, u32)>,
}

impl FaultLog for Recorder {
    fn record(&mut self, faults: FaultSet, cycle: u32) {
        self.records.push((faults, cycle));
    }
}

fn run_until(
    inverter: &mut Inverter<Recorder>,
    grid: &mut Grid,
    mode: Mode,
    limit: u32,
) {
    for _ in 0..limit {
        let duties = inverter.control_loop(&grid.next());
        assert!(duties.iter().all(|d| (0. ..=1.).contains(d)), "{duties:?}");
        if inverter.mode() == mode {
            return;
        }
    }
    panic!("still in {:?} after {limit} cycles", inverter.mode());
}

/// An inverter that has been through startup and is running on `grid`.
fn running(grid: &mut Grid) -> Inverter<Recorder> {
    let mut inverter = Inverter::builder()
        .startup(StartupConfig {
            cycles: 10,
            ..StartupConfig::default()
        })
        .fault_log(Recorder::default())
        .build()
        .unwrap();
    inverter.start().unwrap();
    run_until(&mut inverter, grid, Mode::Running, 20_000);
    for _ in 0..200 {
        inverter.control_loop(&grid.next());
    }
    assert_eq!(inverter.mode(), Mode::Running);
    assert!(inverter.sector().is_some());
    inverter
}

#[test]
fn over_current_trips_after_debounce() {
    init_logger();
    let mut inverter = Inverter::new(Default::default()).unwrap();

    for _ in 0..20 {
        inverter.control_loop(&frame(Abc::default(), 700., 25.));
    }
    assert!(inverter.is_safe());
    assert_ne!(inverter.mode(), Mode::Fault);

    let over_current = frame(Abc::new(150., 150., 150.), 700., 25.);
    for call in 1..=10 {
        inverter.control_loop(&over_current);
        assert!(inverter.is_safe(), "confirmed early at call {call}");
        assert_ne!(inverter.mode(), Mode::Fault);
    }

    let duties = inverter.control_loop(&over_current);
    assert!(inverter.protection().active().contains(FaultKind::OverCurrent));
    assert_eq!(inverter.mode(), Mode::Fault);
    assert_eq!(duties, [0.5; 3]);
    assert_eq!(inverter.duties(), [0.5; 3]);
    assert_eq!(inverter.sector(), None);
}

#[test]
fn startup_sequence_reaches_running() {
    init_logger();
    let mut inverter = Inverter::builder()
        .fault_log(Recorder::default())
        .build()
        .unwrap();
    let mut grid = Grid::new();

    inverter.start().unwrap();
    run_until(&mut inverter, &mut grid, Mode::GridCheck, 10);
    run_until(&mut inverter, &mut grid, Mode::Startup, 20_000);
    assert!(inverter.is_running());
    assert!(inverter.pll().is_locked());

    run_until(&mut inverter, &mut grid, Mode::Running, 5_000);
    for _ in 0..2_000 {
        inverter.control_loop(&grid.next());
    }
    assert_eq!(inverter.mode(), Mode::Running);
    assert!(inverter.fault_log().records.is_empty());

    // Bus at its reference: no active current requested
    assert!(inverter.current_reference().d.abs() < 1e-3);
    // The voltage command follows the grid
    let command = inverter.voltage_command_dq();
    assert!((command.d - inverter.v_dq().d).abs() < 50., "{command:?}");
    assert!(inverter.sector().is_some());
}

#[test]
fn grid_loss_faults_and_clears() {
    init_logger();
    let mut inverter = Inverter::builder()
        .fault_log(Recorder::default())
        .build()
        .unwrap();
    let mut grid = Grid::new();

    inverter.start().unwrap();
    run_until(&mut inverter, &mut grid, Mode::Startup, 20_000);

    grid.magnitude = 0.;
    let duties = inverter.control_loop(&grid.next());
    assert_eq!(inverter.mode(), Mode::Fault);
    assert_eq!(duties, [0.5; 3]);
    assert!(inverter.protection().latched().contains(FaultKind::GridLost));
    assert!(inverter.protection().triggered());

    let (logged, _) = inverter.fault_log().records[0];
    assert!(logged.contains(FaultKind::GridLost));

    // Grid returns, but the fault holds until cleared
    grid.magnitude = V_PEAK;
    for _ in 0..1_000 {
        assert_eq!(inverter.control_loop(&grid.next()), [0.5; 3]);
    }
    assert_eq!(inverter.mode(), Mode::Fault);

    inverter.clear_faults();
    assert_eq!(inverter.mode(), Mode::Standby);
    assert!(inverter.protection().latched().is_empty());

    inverter.start().unwrap();
    run_until(&mut inverter, &mut grid, Mode::Startup, 20_000);
}

#[test]
fn step_samples_and_drives() {
    struct Gates {
        last: Option<[f32; 3]>,
    }

    impl GateDrive for Gates {
        fn drive(&mut self, duty_cycle_ratios: [f32; 3]) {
            self.last = Some(duty_cycle_ratios);
        }
    }

    let constant = |value: f32| move || value;
    let mut sensors = SensorBank::new(
        [constant(0.), constant(0.), constant(0.)],
        [constant(0.), constant(0.), constant(0.)],
        constant(700.),
        constant(30.),
    );
    let mut gates = Gates { last: None };

    let mut inverter = Inverter::new(Default::default()).unwrap();
    let duties = inverter.step(&mut sensors, &mut gates);
    assert_eq!(gates.last, Some(duties));
    assert_eq!(inverter.frame().temperature, 30.);
    assert_eq!(inverter.cycle_count(), 1);
}

#[test]
fn single_glitched_samples_do_not_stall_the_current_loop() {
    init_logger();
    let mut grid = Grid::new();
    let mut inverter = running(&mut grid);

    let mut glitch = grid.next();
    glitch.currents.a = f32::NAN;
    assert_eq!(inverter.control_loop(&glitch), [0.5; 3]);
    assert_eq!(inverter.sector(), None);

    let mut glitch = grid.next();
    glitch.v_dc = f32::NAN;
    assert_eq!(inverter.control_loop(&glitch), [0.5; 3]);

    for _ in 0..2_000 {
        inverter.control_loop(&grid.next());
    }
    assert_eq!(inverter.mode(), Mode::Running);
    assert!(inverter.is_safe());
    assert!(inverter.sector().is_some());

    let command = inverter.voltage_command();
    assert!(command.alpha.is_finite() && command.beta.is_finite());
    let reference = inverter.current_reference();
    assert!(reference.d.is_finite() && reference.q.is_finite());
    assert!(inverter.fault_log().records.is_empty());
}

#[test]
fn bus_above_reference_exports_current() {
    init_logger();
    let mut grid = Grid::new();
    let mut inverter = running(&mut grid);
    let rated = inverter.config().ratings.current;

    inverter.set_v_dc_reference(680.);
    inverter.control_loop(&grid.next());
    assert!(inverter.current_reference().d > 0.);

    for _ in 0..5_000 {
        inverter.control_loop(&grid.next());
        let d = inverter.current_reference().d;
        assert!(d > 0. && d <= rated, "i_d_ref = {d}");
    }
    assert_eq!(inverter.mode(), Mode::Running);

    // Bus below its reference: draw current back in
    inverter.set_v_dc_reference(720.);
    for _ in 0..5_000 {
        inverter.control_loop(&grid.next());
    }
    let d = inverter.current_reference().d;
    assert!(d < 0. && d >= -rated, "i_d_ref = {d}");
}
