fn main() {
    fude_trainer::cli::main_entry();
}
