fn main() {
    medreport_lib::run()
}
