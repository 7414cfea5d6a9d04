use chrono::Utc;
use clap::{Parser, Subcommand};
use liftlog_core::history::{
    find_last_log_for_routine, format_duration, format_weight, summarize, summarize_all,
};
use liftlog_core::routines::routine_preview;
use liftlog_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(about = "Strength workout tracker with AI-assisted routines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the demo collections
    #[arg(long, global = true)]
    demo: bool,

    /// Sign in with this token instead of anonymously
    #[arg(long, global = true)]
    token: Option<String>,

    /// API key for the generative-language endpoint
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List routines (default)
    Routines,

    /// Create a routine
    Add {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// Exercise as NAME[:SETSxREPS[:NOTE]]; repeat for more
        #[arg(long = "exercise", short = 'e')]
        exercises: Vec<String>,
    },

    /// Change a routine's name, notes or exercises
    Edit {
        /// Routine number, id or name
        routine: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Replace the exercise list; repeat for more
        #[arg(long = "exercise", short = 'e')]
        exercises: Vec<String>,
    },

    /// Delete a routine
    Delete {
        /// Routine number, id or name
        routine: String,
    },

    /// Ask the AI coach for a routine
    Generate {
        /// What kind of workout you want
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        /// Store the generated routine
        #[arg(long)]
        save: bool,
    },

    /// Start a workout and log it interactively from stdin
    Start {
        /// Routine number, id or name
        routine: String,
    },

    /// Show finished workouts
    History {
        /// Also export every set to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show strength progress for an exercise
    Progress {
        /// Exercise name (defaults to the first alphabetically)
        exercise: Option<String>,

        /// Ask the AI coach for a summary
        #[arg(long)]
        insight: bool,
    },

    /// Fill the demo collections with sample data
    SeedDemo,
}

fn main() -> Result<()> {
    // Keep command output clean unless RUST_LOG says otherwise
    liftlog_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    if cli.token.is_some() {
        config.identity.token = cli.token;
    }
    if cli.api_key.is_some() {
        config.completion.api_key = cli.api_key;
    }

    let mode = if cli.demo { StoreMode::Demo } else { StoreMode::Normal };
    tracing::debug!("Using data directory {:?} in {:?} mode", config.data.data_dir, mode);
    let ctx = AppContext::from_config(config)?;
    let mut shell = Shell::open(ctx, mode)?;

    match cli.command {
        Some(Commands::Routines) | None => cmd_routines(&shell),
        Some(Commands::Add {
            name,
            notes,
            exercises,
        }) => cmd_add(&mut shell, name, notes, &exercises),
        Some(Commands::Edit {
            routine,
            name,
            notes,
            exercises,
        }) => cmd_edit(&mut shell, &routine, name, notes, &exercises),
        Some(Commands::Delete { routine }) => cmd_delete(&mut shell, &routine),
        Some(Commands::Generate { prompt, save }) => cmd_generate(&mut shell, &prompt.join(" "), save),
        Some(Commands::Start { routine }) => cmd_start(&mut shell, &routine),
        Some(Commands::History { csv }) => cmd_history(&shell, csv),
        Some(Commands::Progress { exercise, insight }) => cmd_progress(&shell, exercise, insight),
        Some(Commands::SeedDemo) => cmd_seed_demo(&mut shell),
    }
}

// ============================================================================
// Routines
// ============================================================================

fn cmd_routines(shell: &Shell) -> Result<()> {
    let heading = match shell.mode() {
        StoreMode::Demo => "Demo Workouts",
        StoreMode::Normal => "My Workouts",
    };
    println!("{}", heading);

    if shell.routines().is_empty() {
        match shell.mode() {
            StoreMode::Demo => println!("  No routines yet. Run `liftlog seed-demo` to generate data."),
            StoreMode::Normal => println!("  No routines yet. Create one with `liftlog add` or `liftlog generate`."),
        }
        return Ok(());
    }

    for (index, routine) in shell.routines().iter().enumerate() {
        println!();
        println!("{:>3}. {}", index + 1, routine.name);
        if !routine.notes.is_empty() {
            println!("     {}", routine.notes);
        }
        let (names, more) = routine_preview(routine);
        let mut preview = names.join(", ");
        if more > 0 {
            preview.push_str(&format!(" +{} more", more));
        }
        println!("     {}", preview);
        if let Some(last) = find_last_log_for_routine(shell.logs(), &routine.id) {
            println!("     Last done {}", summarize(last).date);
        }
    }
    Ok(())
}

/// Parse `NAME[:SETSxREPS[:NOTE]]`
fn parse_exercise(arg: &str) -> ExerciseTemplate {
    let mut parts = arg.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let (sets, reps) = match parts.next() {
        Some(targets) => match targets.split_once(['x', 'X']) {
            Some((sets, reps)) => (sets.trim(), reps.trim()),
            None => (targets.trim(), ""),
        },
        None => ("", ""),
    };
    let notes = parts.next().unwrap_or_default().trim();
    ExerciseTemplate::new(name, sets, reps).with_notes(notes)
}

fn resolve_routine(shell: &Shell, key: &str) -> Result<String> {
    let routines = shell.routines();
    if let Ok(number) = key.parse::<usize>() {
        if let Some(routine) = number.checked_sub(1).and_then(|i| routines.get(i)) {
            return Ok(routine.id.clone());
        }
    }
    routines
        .iter()
        .find(|r| r.id == key)
        .or_else(|| routines.iter().find(|r| r.name.eq_ignore_ascii_case(key)))
        .map(|r| r.id.clone())
        .ok_or_else(|| Error::Other(format!("No routine matches '{}'", key)))
}

fn save_editor(shell: &mut Shell, editor: &RoutineEditor) -> Result<()> {
    let draft = editor.save().ok_or_else(|| {
        Error::Other("A routine needs a name and at least one exercise".into())
    })?;
    let name = draft.name.clone();
    shell.save_routine(draft, editor.editing())?;
    println!("✓ Saved routine '{}'", name);
    Ok(())
}

fn cmd_add(shell: &mut Shell, name: String, notes: String, exercises: &[String]) -> Result<()> {
    let mut editor = RoutineEditor::new();
    editor.name = name;
    editor.notes = notes;
    editor.exercises = exercises.iter().map(|e| parse_exercise(e)).collect();
    save_editor(shell, &editor)
}

fn cmd_edit(
    shell: &mut Shell,
    key: &str,
    name: Option<String>,
    notes: Option<String>,
    exercises: &[String],
) -> Result<()> {
    let id = resolve_routine(shell, key)?;
    let routine = shell
        .routine(&id)
        .ok_or_else(|| Error::Other(format!("No routine matches '{}'", key)))?;

    let mut editor = RoutineEditor::edit(routine);
    if let Some(name) = name {
        editor.name = name;
    }
    if let Some(notes) = notes {
        editor.notes = notes;
    }
    if !exercises.is_empty() {
        editor.exercises = exercises.iter().map(|e| parse_exercise(e)).collect();
    }
    save_editor(shell, &editor)
}

fn cmd_delete(shell: &mut Shell, key: &str) -> Result<()> {
    let id = resolve_routine(shell, key)?;
    if shell.delete_routine(&id)? {
        println!("✓ Deleted routine");
    } else {
        println!("Routine was already gone");
    }
    Ok(())
}

fn cmd_generate(shell: &mut Shell, prompt: &str, save: bool) -> Result<()> {
    println!("Asking the AI coach...");
    let draft = shell.generate_routine(prompt)?;

    println!();
    println!("  {}", draft.name);
    if !draft.notes.is_empty() {
        println!("  {}", draft.notes);
    }
    for exercise in &draft.exercises {
        print!("  • {}", exercise.name);
        if !exercise.sets.is_empty() || !exercise.reps.is_empty() {
            print!("  {} x {}", exercise.sets, exercise.reps);
        }
        if !exercise.notes.is_empty() {
            print!("  ({})", exercise.notes);
        }
        println!();
    }

    if save {
        let name = draft.name.clone();
        shell.save_routine(draft, None)?;
        println!("\n✓ Saved routine '{}'", name);
    } else {
        println!("\nRun again with --save to keep it.");
    }
    Ok(())
}

// ============================================================================
// Workout
// ============================================================================

fn cmd_start(shell: &mut Shell, key: &str) -> Result<()> {
    let id = resolve_routine(shell, key)?;
    shell.start_workout(&id, Utc::now())?;
    show_workout(shell);
    print_workout_help();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            if shell.discard_workout() {
                println!("\nInput closed. Workout discarded.");
            }
            return Ok(());
        };
        let line = line?;

        shell.pump();
        shell.tick(Utc::now());

        match run_workout_command(shell, line.trim()) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Finish) => match shell.finish_workout(Utc::now()) {
                Ok(log) => {
                    println!(
                        "✓ Workout saved: {} ({})",
                        log.routine_name,
                        format_duration(log.duration_seconds)
                    );
                    return Ok(());
                }
                Err(e) => eprintln!("Failed to save workout: {}. It is still active.", e),
            },
            Ok(Flow::Cancel) => {
                shell.discard_workout();
                println!("Workout discarded.");
                return Ok(());
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

enum Flow {
    Continue,
    Finish,
    Cancel,
}

fn print_workout_help() {
    println!("─────────────────────────────────────────");
    println!("Commands (numbers start at 1):");
    println!("  w EX SET VALUE   set weight      r EX SET VALUE   set reps");
    println!("  done EX SET      toggle complete add EX           add a set");
    println!("  rm EX SET        remove a set    show             show workout");
    println!("  pause            pause/resume rest timer");
    println!("  +                add rest time   close            hide rest timer");
    println!("  timer            show/hide rest timer");
    println!("  min / max        minimize / restore the workout");
    println!("  finish           save workout    cancel           discard workout");
}

fn parse_index(token: Option<&str>, what: &str) -> Result<usize> {
    token
        .and_then(|t| t.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| Error::Other(format!("Expected a {} number starting at 1", what)))
}

fn active(shell: &mut Shell) -> Result<&mut WorkoutSession> {
    shell
        .active_session_mut()
        .ok_or_else(|| Error::Session("No active workout".into()))
}

fn run_workout_command(shell: &mut Shell, line: &str) -> Result<Flow> {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return Ok(Flow::Continue);
    };

    match command.to_lowercase().as_str() {
        "w" | "weight" | "r" | "reps" => {
            let field: SetField = command.parse()?;
            let exercise = parse_index(tokens.next(), "exercise")?;
            let set = parse_index(tokens.next(), "set")?;
            let value = tokens.collect::<Vec<_>>().join(" ");
            active(shell)?.update_set(exercise, set, field, value)?;
        }
        "done" => {
            let exercise = parse_index(tokens.next(), "exercise")?;
            let set = parse_index(tokens.next(), "set")?;
            let completed = shell.toggle_set_complete(exercise, set, Utc::now())?;
            let session = active(shell)?;
            let name = session.exercises()[exercise].name.clone();
            if completed {
                println!("✓ Set {} of {} complete", set + 1, name);
                print_rest_timer(session.rest_timer());
            } else {
                println!("Set {} of {} marked not done", set + 1, name);
            }
        }
        "add" => {
            let exercise = parse_index(tokens.next(), "exercise")?;
            let session = active(shell)?;
            session.add_set(exercise)?;
            println!(
                "Added set {} to {}",
                session.exercises()[exercise].sets().len(),
                session.exercises()[exercise].name
            );
        }
        "rm" | "remove" => {
            let exercise = parse_index(tokens.next(), "exercise")?;
            let set = parse_index(tokens.next(), "set")?;
            if !active(shell)?.remove_set(exercise, set)? {
                println!("An exercise keeps at least one set");
            }
        }
        "pause" => {
            let session = active(shell)?;
            session.rest_timer_mut().toggle();
            print_rest_timer(session.rest_timer());
        }
        "+" => {
            if shell.add_rest_time() {
                print_rest_timer(active(shell)?.rest_timer());
            } else {
                println!("No workout in progress");
            }
        }
        "close" => active(shell)?.rest_timer_mut().close(),
        "timer" => {
            let session = active(shell)?;
            session.rest_timer_mut().toggle_panel();
            print_rest_timer(session.rest_timer());
        }
        "min" | "minimize" => {
            shell.minimize();
            show_workout(shell);
        }
        "max" | "maximize" => {
            shell.maximize();
            show_workout(shell);
        }
        "show" => show_workout(shell),
        "help" | "?" => print_workout_help(),
        "finish" => return Ok(Flow::Finish),
        "cancel" => return Ok(Flow::Cancel),
        other => {
            return Err(Error::Other(format!(
                "Unknown command '{}'. Type 'help' for commands.",
                other
            )))
        }
    }
    Ok(Flow::Continue)
}

fn print_rest_timer(timer: &RestTimer) {
    if !timer.is_visible() || timer.remaining() == 0 {
        return;
    }
    let category = timer
        .category()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    let paused = if timer.is_running() { "" } else { " paused" };
    println!(
        "Rest timer {}{}{}",
        format_clock(u64::from(timer.remaining())),
        category,
        paused
    );
}

fn show_workout(shell: &Shell) {
    let Some(session) = shell.active_session() else {
        return;
    };

    if shell.is_minimized() {
        println!(
            "▶ {} in progress  {}",
            session.routine_name(),
            format_clock(session.elapsed_seconds())
        );
        return;
    }

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}  {}", session.routine_name(), format_clock(session.elapsed_seconds()));
    println!("╰─────────────────────────────────────────╯");

    for (i, exercise) in session.exercises().iter().enumerate() {
        println!();
        print!("{:>3}. {}", i + 1, exercise.name);
        if !exercise.target_sets.is_empty() || !exercise.target_reps.is_empty() {
            print!("  target {} x {}", exercise.target_sets, exercise.target_reps);
        }
        println!();
        if !exercise.notes.is_empty() {
            println!("     ℹ {}", exercise.notes);
        }
        for (j, set) in exercise.sets().iter().enumerate() {
            let mark = if set.completed { "✓" } else { " " };
            let previous = session
                .previous_set(&exercise.name, j)
                .map(|p| format!("  prev {} x {}", p.weight, p.reps))
                .unwrap_or_default();
            println!(
                "     {}. [{}] {:>6} lbs x {:<4}{}",
                j + 1,
                mark,
                set.weight,
                set.reps,
                previous
            );
        }
    }
    println!();
    print_rest_timer(session.rest_timer());
}

// ============================================================================
// History and progress
// ============================================================================

fn cmd_history(shell: &Shell, csv: Option<PathBuf>) -> Result<()> {
    let heading = match shell.mode() {
        StoreMode::Demo => "Demo History",
        StoreMode::Normal => "Workout History",
    };
    println!("{}", heading);

    if shell.logs().is_empty() {
        println!("  No workouts logged yet.");
    }

    for summary in summarize_all(shell.logs()) {
        println!();
        println!("  {}", summary.routine_name);
        println!("  {} • {}", summary.date, summary.duration);
        for exercise in &summary.exercises {
            println!(
                "    {:<24} {} sets • Best: {} lbs",
                exercise.name,
                exercise.set_count,
                format_weight(exercise.best_weight)
            );
        }
    }

    if let Some(path) = csv {
        let rows = export::export_csv(shell.logs(), &path)?;
        println!("\n✓ Exported {} sets to {}", rows, path.display());
    }
    Ok(())
}

fn cmd_progress(shell: &Shell, exercise: Option<String>, insight: bool) -> Result<()> {
    let names = progress::exercise_names(shell.logs());
    if names.is_empty() {
        println!("No workouts logged yet.");
        return Ok(());
    }

    let selected = exercise.unwrap_or_else(|| names[0].clone());
    println!("Exercises: {}", names.join(", "));
    println!();
    println!("{}", selected);

    let points = progress::chart_data(shell.logs(), &selected);
    if points.is_empty() {
        println!("  No weighted sets recorded for {}", selected);
    } else {
        for point in &points {
            println!(
                "  {:<8} {:>7} lbs   volume {}",
                point.label,
                format_weight(point.max_weight),
                format_weight(point.volume)
            );
        }
        if let Some(best) = progress::personal_best(&points) {
            println!("  Personal best: {} lbs", format_weight(best));
        }
    }

    if insight {
        println!();
        match shell.insight() {
            Some(text) => {
                println!("AI Coach Insights");
                for line in text.lines() {
                    println!("  {}", line);
                }
            }
            None => println!("AI insights need a completion API key."),
        }
    }
    Ok(())
}

fn cmd_seed_demo(shell: &mut Shell) -> Result<()> {
    if !shell.set_demo_mode(true)? {
        return Err(Error::Other("Cannot switch to demo mode right now".into()));
    }
    if shell.seed_demo_data(Utc::now())? {
        println!(
            "✓ Seeded {} demo routines and {} demo workouts",
            demo::demo_routines().len(),
            demo::DEMO_LOG_COUNT
        );
        println!("  View them with `liftlog --demo routines`");
    }
    Ok(())
}
