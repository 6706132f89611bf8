use calcsession::{logging, InterpreterError, Session};
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

const ALLOWED_EXTENSION: &str = "calc";

fn print_usage(program_name: &str) {
    println!("Usage:");
    println!("  {} \"expression\"        Evaluate a single expression", program_name);
    println!("  {} --interactive | -i    Start interactive mode", program_name);
    println!("  {} --file | -f <path>    Evaluate expressions from .{} file line by line", program_name, ALLOWED_EXTENSION);
    println!("  {} --script | -s <path>  Evaluate .{} file as complete script", program_name, ALLOWED_EXTENSION);
    println!("  {} --help | -h           Show this help", program_name);
}

fn report(result: Result<Option<f64>, InterpreterError>) {
    match result {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => {}
        Err(error) => {
            log::warn!("{}", error);
            eprintln!("{}", error);
        }
    }
}

fn list_variables(session: &Session) {
    let mut names = session.variable_names();
    names.sort();
    if names.is_empty() {
        println!("No variables defined.");
        return;
    }
    let max_name_len = names.iter().map(|n| n.len()).max().unwrap_or(0);
    for name in names {
        println!("{:width$}", name, width = max_name_len);
    }
}

fn interactive_mode(session: &mut Session) -> Result<(), Box<dyn Error>> {
    println!("Interactive calculator mode");
    println!("Type \"exit()\" or \"quit()\" to exit");
    println!("Type \"vars()\" to list all defined variables");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!(">>> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "exit()" | "quit()" => break,
            "vars()" => {
                list_variables(session);
                continue;
            }
            "" => continue,
            _ => {}
        }

        report(session.add_expression(input));
    }

    Ok(())
}

fn has_allowed_extension(file_path: &str) -> bool {
    Path::new(file_path).extension().and_then(|ext| ext.to_str()) == Some(ALLOWED_EXTENSION)
}

fn file_mode(file_path: &str, session: &mut Session, whole_script: bool) -> Result<(), Box<dyn Error>> {
    if !has_allowed_extension(file_path) {
        return Err(format!("Error: File must have .{} extension", ALLOWED_EXTENSION).into());
    }

    println!("Executing file: {}", file_path);

    if whole_script {
        let mut file = File::open(file_path)?;
        let mut script = String::new();
        file.read_to_string(&mut script)?;
        report(session.add_expression(&script));
    } else {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        for line_result in reader.lines() {
            let line = line_result?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
                continue;
            }
            report(session.add_expression(trimmed));
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::setup_logger();
    let args: Vec<String> = env::args().collect();

    let mut session = Session::create();

    if args.len() < 2 {
        print_usage(&args[0]);
        return Ok(());
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage(&args[0]);
        }
        "--interactive" | "-i" => {
            interactive_mode(&mut session)?;
        }
        "--file" | "-f" => {
            if args.len() < 3 {
                println!("Error: Missing file path");
                print_usage(&args[0]);
                return Ok(());
            }
            file_mode(&args[2], &mut session, false)?;
        }
        "--script" | "-s" => {
            if args.len() < 3 {
                println!("Error: Missing file path");
                print_usage(&args[0]);
                return Ok(());
            }
            file_mode(&args[2], &mut session, true)?;
        }
        _ => {
            let expression = &args[1];
            report(session.add_expression(expression));
        }
    }

    Ok(())
}
