fn main() {
    route_cluster::cli::run();
}
